//! Answer orchestration: one-shot startup and per-query routing.

use crate::config::{self, AppConfig, ModelLoadError};
use crate::confluence::{self, Credentials, FetchError};
use crate::doc_processor;
use crate::embedding::{self, Embedder, EmbeddingError, RankedChunk};
use crate::intent::{self, Intent};
use crate::models::{Chunk, Page};
use crate::summarizer::{self, Summarizer};
use serde::Serialize;
use std::fmt;
use tokio::sync::OnceCell;
use tracing::{error, info};

pub const INITIALIZING_MESSAGE: &str = "System is still initializing. Please try again shortly.";
pub const QUERY_ERROR_MESSAGE: &str = "An error occurred while processing your query.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    NotStarted,
    Failed(String),
    Ready,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::NotStarted => write!(f, "not started"),
            Readiness::Failed(reason) => write!(f, "failed: {}", reason),
            Readiness::Ready => write!(f, "ready"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("model load failed: {0}")]
    ModelLoad(#[from] ModelLoadError),
    #[error("page fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("the assistant has not started")]
    NotStarted,
    #[error("startup failed: {0}")]
    StartupFailed(String),
    #[error("retrieval failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub intent: Intent,
    pub text: String,
}

/// Everything a query needs, built once at startup and read-only afterwards.
pub struct KnowledgeBase {
    base_url: String,
    pages: Vec<Page>,
    chunks: Vec<Chunk>,
    top_k: usize,
    embedder: Box<dyn Embedder>,
    summarizer: Box<dyn Summarizer>,
}

impl KnowledgeBase {
    pub fn new(
        base_url: impl Into<String>,
        pages: Vec<Page>,
        chunks: Vec<Chunk>,
        top_k: usize,
        embedder: Box<dyn Embedder>,
        summarizer: Box<dyn Summarizer>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            pages,
            chunks,
            top_k,
            embedder,
            summarizer,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<RankedChunk<'_>>, EmbeddingError> {
        embedding::rank_chunks(self.embedder.as_ref(), &self.chunks, query, top_k).await
    }

    pub async fn respond(&self, query: &str) -> Result<Answer, QueryError> {
        let intent = intent::detect_intent(query);
        let text = match intent {
            Intent::Link => intent::page_links(&self.pages, &self.base_url, query),
            Intent::Content => {
                let ranked = self.search(query, self.top_k).await?;
                let texts: Vec<&str> = ranked.iter().map(|r| r.chunk.text.as_str()).collect();
                summarizer::summarize_chunks(self.summarizer.as_ref(), &texts).await
            }
        };
        Ok(Answer { intent, text })
    }
}

/// Load both models, fetch the space and chunk it, in that order.
pub async fn load_knowledge_base(
    config: &AppConfig,
    credentials: &Credentials,
) -> Result<KnowledgeBase, StartupError> {
    let client = config.http_client()?;

    info!("STARTUP: loading embedder...");
    let embedder = config::load_embedder(&client, config)?;
    embedder
        .embed("warmup")
        .await
        .map_err(|e| ModelLoadError::Unavailable {
            model: config.embed_model.clone(),
            reason: e.to_string(),
        })?;
    info!(model = embedder.model(), "STARTUP: embedder loaded");

    info!("STARTUP: loading summarizer...");
    let summarizer = config::load_summarizer(&client, config)?;
    info!(model = summarizer.model(), "STARTUP: summarizer loaded");

    info!(space = %config.confluence.space_key, "STARTUP: fetching pages...");
    let pages = confluence::fetch_pages(&client, &config.confluence, credentials).await?;
    info!(pages = pages.len(), "STARTUP: pages fetched");

    info!("STARTUP: preprocessing content...");
    let chunks = doc_processor::chunk_pages(&pages, config.chunk_size, config.chunk_overlap);
    info!(chunks = chunks.len(), "STARTUP: preprocessing complete");

    Ok(KnowledgeBase::new(
        config.confluence.base_url.clone(),
        pages,
        chunks,
        config.top_k,
        Box::new(embedder),
        Box::new(summarizer),
    ))
}

/// Query entrypoint. Serves the initializing message until startup succeeds.
#[derive(Default)]
pub struct Assistant {
    state: OnceCell<Result<KnowledgeBase, String>>,
}

impl Assistant {
    pub fn new() -> Self {
        Self::default()
    }

    /// An assistant that is already ready, for callers that build the context themselves.
    pub fn with_knowledge_base(kb: KnowledgeBase) -> Self {
        Self {
            state: OnceCell::new_with(Some(Ok(kb))),
        }
    }

    /// Run startup once. Later calls return the outcome of the first.
    pub async fn start(&self, config: &AppConfig, credentials: &Credentials) -> Readiness {
        self.state
            .get_or_init(|| async {
                info!("STARTUP: entered startup");
                match load_knowledge_base(config, credentials).await {
                    Ok(kb) => {
                        info!("STARTUP: completed successfully");
                        Ok(kb)
                    }
                    Err(e) => {
                        error!("STARTUP FAILED: {}", e);
                        Err(e.to_string())
                    }
                }
            })
            .await;
        self.readiness()
    }

    pub fn readiness(&self) -> Readiness {
        match self.state.get() {
            None => Readiness::NotStarted,
            Some(Err(reason)) => Readiness::Failed(reason.clone()),
            Some(Ok(_)) => Readiness::Ready,
        }
    }

    pub fn knowledge_base(&self) -> Option<&KnowledgeBase> {
        self.state.get().and_then(|s| s.as_ref().ok())
    }

    pub async fn respond(&self, query: &str) -> Result<Answer, QueryError> {
        match self.state.get() {
            None => Err(QueryError::NotStarted),
            Some(Err(reason)) => Err(QueryError::StartupFailed(reason.clone())),
            Some(Ok(kb)) => kb.respond(query).await,
        }
    }

    /// Always yields a displayable string; failures are logged and rendered.
    pub async fn answer(&self, query: &str) -> String {
        info!("answer_query received: {}", query);
        let text = match self.respond(query).await {
            Ok(answer) => answer.text,
            Err(QueryError::NotStarted) | Err(QueryError::StartupFailed(_)) => {
                INITIALIZING_MESSAGE.to_string()
            }
            Err(e) => {
                error!("Error inside answer_query: {}", e);
                QUERY_ERROR_MESSAGE.to_string()
            }
        };
        info!("answer_query returned: {:?}", text);
        text
    }
}
