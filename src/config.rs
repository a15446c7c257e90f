use crate::confluence::{ConfluenceConfig, DEFAULT_BASE_URL, DEFAULT_PAGE_LIMIT, DEFAULT_SPACE_KEY};
use crate::db::Database;
use crate::doc_processor::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embedding::ApiEmbedder;
use crate::llm::claude::{self, ClaudeConfig};
use crate::llm::openai::{self, OpenAiConfig};
use crate::llm::Provider;
use crate::summarizer::LlmSummarizer;
use clap::Args;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_EMBED_MODEL: &str = "openai/text-embedding-3-small";
pub const DEFAULT_SUMMARIZER_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),
    #[error("provider '{provider}' does not offer {capability}")]
    Unsupported {
        provider: &'static str,
        capability: &'static str,
    },
    #[error("model '{model}' is unavailable: {reason}")]
    Unavailable { model: String, reason: String },
    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Command-line and environment configuration shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Base URL of the Confluence wiki
    #[arg(long, global = true, env = "CONFLUENCE_URL", default_value = DEFAULT_BASE_URL)]
    pub confluence_url: String,

    /// Space whose pages are loaded
    #[arg(long, global = true, env = "CONFLUENCE_SPACE_KEY", default_value = DEFAULT_SPACE_KEY)]
    pub space_key: String,

    /// Maximum number of pages fetched at startup
    #[arg(long, global = true, default_value_t = DEFAULT_PAGE_LIMIT)]
    pub page_limit: usize,

    /// Atlassian account email (otherwise read from the settings store)
    #[arg(long, global = true, env = "CONFLUENCE_EMAIL")]
    pub email: Option<String>,

    /// Confluence API token (otherwise read from the settings store)
    #[arg(long, global = true, env = "CONFLUENCE_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Embedding model as provider/model
    #[arg(long, global = true, env = "EMBED_MODEL", default_value = DEFAULT_EMBED_MODEL)]
    pub embed_model: String,

    /// Summarization model as provider/model
    #[arg(long, global = true, env = "SUMMARIZER_MODEL", default_value = DEFAULT_SUMMARIZER_MODEL)]
    pub summarizer_model: String,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    #[arg(long, global = true, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub claude_api_key: Option<String>,

    #[arg(long, global = true, env = "ANTHROPIC_BASE_URL")]
    pub claude_base_url: Option<String>,

    #[arg(long, global = true, env = "OLLAMA_HOST")]
    pub ollama_host: Option<String>,

    /// Directory holding the settings database
    #[arg(long, global = true, env = "WIKI_COPILOT_HOME")]
    pub data_dir: Option<PathBuf>,

    /// Maximum characters per chunk
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Characters shared between adjacent chunks
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub chunk_overlap: usize,

    /// Number of chunks summarized per answer
    #[arg(long, global = true, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true, default_value_t = 120)]
    pub request_timeout_secs: u64,
}

impl ConfigArgs {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wiki-copilot")
        })
    }

    /// Resolve the runtime configuration, filling provider settings missing
    /// from the command line or environment from the settings store.
    pub fn resolve(&self, db: &Database) -> AppConfig {
        let stored = |key: &str| db.get_setting(key).ok().flatten();
        let keys = ProviderKeys {
            openai_api_key: self.openai_api_key.clone().or_else(|| stored("openai_api_key")),
            openai_base_url: self.openai_base_url.clone().or_else(|| stored("openai_base_url")),
            claude_api_key: self.claude_api_key.clone().or_else(|| stored("claude_api_key")),
            claude_base_url: self.claude_base_url.clone().or_else(|| stored("claude_base_url")),
            ollama_host: self.ollama_host.clone().or_else(|| stored("ollama_host")),
        };
        AppConfig {
            confluence: ConfluenceConfig {
                base_url: self.confluence_url.trim_end_matches('/').to_string(),
                space_key: self.space_key.clone(),
                page_limit: self.page_limit,
            },
            embed_model: self.embed_model.clone(),
            summarizer_model: self.summarizer_model.clone(),
            keys,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub claude_api_key: Option<String>,
    pub claude_base_url: Option<String>,
    pub ollama_host: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub confluence: ConfluenceConfig,
    pub embed_model: String,
    pub summarizer_model: String,
    pub keys: ProviderKeys,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub request_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            confluence: ConfluenceConfig::default(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            summarizer_model: DEFAULT_SUMMARIZER_MODEL.to_string(),
            keys: ProviderKeys::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl AppConfig {
    pub fn http_client(&self) -> Result<Client, ModelLoadError> {
        Ok(Client::builder().timeout(self.request_timeout).build()?)
    }
}

/// Resolve an LLM provider from a model string like "openai/gpt-4o", "claude/...", "ollama/..."
pub fn resolve_provider(model: &str, keys: &ProviderKeys) -> Result<(Provider, String), ModelLoadError> {
    if let Some(model_id) = model.strip_prefix("ollama/") {
        let host = keys
            .ollama_host
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());
        Ok((Provider::ollama(host), model_id.to_string()))
    } else if let Some(model_id) = model.strip_prefix("claude/") {
        let api_key = keys
            .claude_api_key
            .clone()
            .ok_or(ModelLoadError::MissingApiKey("Claude"))?;
        let base_url = keys
            .claude_base_url
            .clone()
            .unwrap_or_else(|| claude::DEFAULT_BASE_URL.to_string());
        Ok((
            Provider::Claude(ClaudeConfig { api_key, base_url }),
            model_id.to_string(),
        ))
    } else {
        let model_id = model.strip_prefix("openai/").unwrap_or(model);
        let api_key = keys
            .openai_api_key
            .clone()
            .ok_or(ModelLoadError::MissingApiKey("OpenAI"))?;
        let base_url = keys
            .openai_base_url
            .clone()
            .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string());
        Ok((
            Provider::OpenAi(OpenAiConfig { api_key, base_url }),
            model_id.to_string(),
        ))
    }
}

pub fn load_embedder(client: &Client, config: &AppConfig) -> Result<ApiEmbedder, ModelLoadError> {
    let (provider, model_id) = resolve_provider(&config.embed_model, &config.keys)?;
    match provider {
        Provider::OpenAi(api) | Provider::Ollama(api) => {
            Ok(ApiEmbedder::new(client.clone(), api, model_id))
        }
        Provider::Claude(_) => Err(ModelLoadError::Unsupported {
            provider: "claude",
            capability: "embeddings",
        }),
    }
}

pub fn load_summarizer(client: &Client, config: &AppConfig) -> Result<LlmSummarizer, ModelLoadError> {
    let (provider, model_id) = resolve_provider(&config.summarizer_model, &config.keys)?;
    Ok(LlmSummarizer::new(client.clone(), provider, model_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    fn keys() -> ProviderKeys {
        ProviderKeys {
            openai_api_key: Some("sk-openai".into()),
            claude_api_key: Some("sk-claude".into()),
            ..ProviderKeys::default()
        }
    }

    #[test]
    fn test_resolve_provider_prefixes() {
        let (provider, model) = resolve_provider("ollama/nomic-embed-text", &keys()).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(model, "nomic-embed-text");

        let (provider, model) = resolve_provider("claude/claude-3-5-haiku-latest", &keys()).unwrap();
        assert_eq!(provider.name(), "claude");
        assert_eq!(model, "claude-3-5-haiku-latest");

        let (provider, model) = resolve_provider("gpt-4o-mini", &keys()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(model, "gpt-4o-mini");
    }

    #[test]
    fn test_resolve_provider_requires_key() {
        let err = resolve_provider("openai/gpt-4o-mini", &ProviderKeys::default()).unwrap_err();
        assert!(matches!(err, ModelLoadError::MissingApiKey("OpenAI")));
    }

    #[test]
    fn test_claude_cannot_embed() {
        let config = AppConfig {
            embed_model: "claude/claude-3-5-haiku-latest".into(),
            keys: keys(),
            ..AppConfig::default()
        };
        let err = load_embedder(&Client::new(), &config).unwrap_err();
        assert!(matches!(err, ModelLoadError::Unsupported { .. }));
    }

    #[test]
    fn test_resolve_prefers_flags_over_settings_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();
        db.set_setting("openai_api_key", "stored-key").unwrap();
        db.set_setting("ollama_host", "http://gpu-box:11434").unwrap();

        let cli = TestCli::parse_from([
            "test",
            "--openai-api-key",
            "flag-key",
            "--confluence-url",
            "https://wiki.example.com/wiki/",
            "--space-key",
            "ENG",
        ]);
        let config = cli.config.resolve(&db);

        assert_eq!(config.keys.openai_api_key.as_deref(), Some("flag-key"));
        assert_eq!(config.keys.ollama_host.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(config.confluence.base_url, "https://wiki.example.com/wiki");
        assert_eq!(config.confluence.space_key, "ENG");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.top_k, 3);
    }
}
