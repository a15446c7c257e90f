use crate::assistant::Assistant;
use crate::commands::knowledge;
use crate::llm::{ChatMessage, Role};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

pub const CLEARED_MESSAGE: &str = "Chat history cleared. Start fresh!";

const HELP: &str = "Commands:
  /reset           clear the chat history
  /history         show the chat history
  /status          show whether the knowledge base is ready
  /pages           list the loaded pages
  /search <query>  show the best-matching chunks with scores
  /quit            leave the chat
Anything else is sent to the assistant.";

/// A flat, clearable transcript for one chat session.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    messages: Vec<ChatMessage>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_user(&mut self, content: &str) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Blank replies are not recorded.
    pub fn push_assistant(&mut self, content: &str) -> bool {
        if content.trim().is_empty() {
            return false;
        }
        self.messages.push(ChatMessage::assistant(content));
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn render(&self) -> String {
        if self.messages.is_empty() {
            return "No messages yet.".to_string();
        }
        self.messages
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::User => "You",
                    _ => "Confluence Copilot",
                };
                format!("{}:\n{}", speaker, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    Ask(String),
    Reset,
    History,
    Status,
    Pages,
    Search(String),
    Help,
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> ChatCommand {
    let line = line.trim();
    if line.is_empty() {
        return ChatCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ChatCommand::Ask(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name.to_lowercase().as_str() {
        "reset" | "clear" => ChatCommand::Reset,
        "history" => ChatCommand::History,
        "status" => ChatCommand::Status,
        "pages" => ChatCommand::Pages,
        "search" if !arg.is_empty() => ChatCommand::Search(arg.to_string()),
        "quit" | "exit" => ChatCommand::Quit,
        _ => ChatCommand::Help,
    }
}

/// Apply one command to the session and produce the text to print.
/// Returns `None` when the chat should end.
pub async fn handle(
    assistant: &Assistant,
    session: &mut ChatSession,
    command: ChatCommand,
    top_k: usize,
) -> Option<String> {
    let output = match command {
        ChatCommand::Quit => return None,
        ChatCommand::Empty => String::new(),
        ChatCommand::Help => HELP.to_string(),
        ChatCommand::Reset => {
            session.clear();
            CLEARED_MESSAGE.to_string()
        }
        ChatCommand::History => session.render(),
        ChatCommand::Status => format!(
            "Knowledge base: {}\nSession: {}",
            assistant.readiness(),
            session.id()
        ),
        ChatCommand::Pages => match assistant.knowledge_base() {
            Some(kb) => knowledge::list_pages(kb)
                .into_iter()
                .map(|p| format!("{}: {}", p.title, p.url))
                .collect::<Vec<_>>()
                .join("\n"),
            None => crate::assistant::INITIALIZING_MESSAGE.to_string(),
        },
        ChatCommand::Search(query) => match assistant.knowledge_base() {
            Some(kb) => match knowledge::search_knowledge_base(kb, &query, top_k).await {
                Ok(hits) => knowledge::render_chunks(&hits),
                Err(e) => {
                    warn!("search failed: {}", e);
                    format!("Search failed: {}", e)
                }
            },
            None => crate::assistant::INITIALIZING_MESSAGE.to_string(),
        },
        ChatCommand::Ask(query) => {
            session.push_user(&query);
            let reply = assistant
                .answer(&query)
                .instrument(info_span!("chat", session = %session.id()))
                .await;
            session.push_assistant(&reply);
            format!("Confluence Copilot:\n{}", reply)
        }
    };
    Some(output)
}

/// Interactive loop over stdin until `/quit` or end of input.
pub async fn run_chat(assistant: &Assistant, top_k: usize) -> io::Result<()> {
    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout
        .write_all(b"Confluence Copilot: ask a question about your Confluence space (/help for commands)\n")
        .await?;
    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match handle(assistant, &mut session, parse_line(&line), top_k).await {
            Some(output) if output.is_empty() => {}
            Some(output) => {
                stdout.write_all(output.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
            }
            None => break,
        }
    }
    Ok(())
}
