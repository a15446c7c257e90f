use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wiki_copilot_lib::commands::{chat, settings};
use wiki_copilot_lib::config::ConfigArgs;
use wiki_copilot_lib::db::Database;
use wiki_copilot_lib::{Assistant, Readiness};

#[derive(Parser, Debug)]
#[command(
    name = "wiki-copilot",
    version,
    about = "Ask questions about a Confluence space and get summaries or page links"
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// Answer a single question and exit
    Ask {
        query: String,
        /// Print the answer and detected intent as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Forget the stored Confluence email and API token
    ResetCredentials,
    /// Store a setting (provider keys, base URLs, credentials)
    Set { key: String, value: String },
    /// Remove a stored setting
    Unset { key: String },
    /// Show stored settings with secrets masked
    Settings,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let data_dir = cli.config.data_dir();
    let db = Database::new(&data_dir)
        .with_context(|| format!("opening settings store in {}", data_dir.display()))?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::ResetCredentials => {
            settings::reset_credentials(&db)?;
            println!("Credentials cleared. You will be asked to enter them again next time.");
        }
        Command::Set { key, value } => settings::set_setting(&db, &key, &value)?,
        Command::Unset { key } => settings::delete_setting(&db, &key)?,
        Command::Settings => {
            for (key, value) in settings::get_settings(&db)? {
                println!("{} = {}", key, value);
            }
        }
        Command::Ask { query, json } => {
            let assistant = start(&cli.config, &db).await?;
            if json {
                match assistant.respond(&query).await {
                    Ok(answer) => println!("{}", serde_json::to_string_pretty(&answer)?),
                    Err(e) => anyhow::bail!(e),
                }
            } else {
                println!("{}", assistant.answer(&query).await);
            }
        }
        Command::Chat => {
            let assistant = start(&cli.config, &db).await?;
            chat::run_chat(&assistant, cli.config.top_k).await?;
        }
    }
    Ok(())
}

async fn start(args: &ConfigArgs, db: &Database) -> Result<Assistant> {
    let credentials =
        settings::resolve_credentials(db, args.email.as_deref(), args.api_token.as_deref())
            .context("Confluence credentials are required")?;
    let config = args.resolve(db);

    eprintln!("Initializing Confluence Copilot...");
    let assistant = Assistant::new();
    if let Readiness::Failed(reason) = assistant.start(&config, &credentials).await {
        eprintln!("Startup failed, questions cannot be answered: {}", reason);
    }
    Ok(assistant)
}
