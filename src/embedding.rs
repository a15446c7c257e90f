use crate::llm::openai::OpenAiConfig;
use crate::models::Chunk;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Embedding API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Embedding API returned {got} vectors for {expected} inputs")]
    Count { expected: usize, got: usize },
}

/// Text to vector boundary. Vectors are only comparable when produced by the
/// same embedder.
pub trait Embedder: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>>;
}

/// Generate embeddings for a list of texts using the OpenAI-compatible API
pub async fn generate_embeddings(
    client: &Client,
    config: &OpenAiConfig,
    texts: &[String],
    model: &str,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let body = EmbeddingRequest {
        model: model.to_string(),
        input: texts.to_vec(),
    };

    let mut req = client
        .post(format!("{}/embeddings", config.base_url))
        .header("Content-Type", "application/json")
        .json(&body);

    if !config.api_key.is_empty() {
        req = req.header("Authorization", format!("Bearer {}", config.api_key));
    }

    let resp = req.send().await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(EmbeddingError::Api {
            status,
            message: text,
        });
    }

    let data: EmbeddingResponse = resp.json().await?;
    if data.data.len() != texts.len() {
        return Err(EmbeddingError::Count {
            expected: texts.len(),
            got: data.data.len(),
        });
    }
    Ok(data.data.into_iter().map(|d| d.embedding).collect())
}

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint (OpenAI or Ollama).
#[derive(Debug, Clone)]
pub struct ApiEmbedder {
    client: Client,
    config: OpenAiConfig,
    model: String,
}

impl ApiEmbedder {
    pub fn new(client: Client, config: OpenAiConfig, model: impl Into<String>) -> Self {
        Self {
            client,
            config,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Embedder for ApiEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, EmbeddingError>> {
        Box::pin(async move {
            let mut vectors =
                generate_embeddings(&self.client, &self.config, &[text.to_string()], &self.model)
                    .await?;
            // generate_embeddings already checked the count
            Ok(vectors.pop().unwrap_or_default())
        })
    }
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Indices of the `top_k` most similar embeddings, best first.
///
/// The sort is stable, so equal scores keep their original order.
pub fn search_similar(
    query_embedding: &[f32],
    chunk_embeddings: &[Vec<f32>],
    top_k: usize,
) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = chunk_embeddings
        .iter()
        .enumerate()
        .map(|(idx, emb)| (idx, cosine_similarity(query_embedding, emb)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk<'a> {
    pub index: usize,
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Embed the query and every chunk, then keep the `top_k` closest chunks.
///
/// Every chunk is re-embedded on each call; there is no index.
pub async fn rank_chunks<'a>(
    embedder: &dyn Embedder,
    chunks: &'a [Chunk],
    query: &str,
    top_k: usize,
) -> Result<Vec<RankedChunk<'a>>, EmbeddingError> {
    if top_k == 0 || chunks.is_empty() {
        return Ok(Vec::new());
    }
    let query_embedding = embedder.embed(query).await?;
    let mut chunk_embeddings = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        chunk_embeddings.push(embedder.embed(&chunk.text).await?);
    }

    Ok(search_similar(&query_embedding, &chunk_embeddings, top_k)
        .into_iter()
        .map(|(index, score)| RankedChunk {
            index,
            chunk: &chunks[index],
            score,
        })
        .collect())
}
