//! Map-then-reduce summarization of retrieved chunks.

use crate::llm::{ChatMessage, ChatRequest, LlmError, Provider};
use futures::future::BoxFuture;
use reqwest::Client;
use tracing::{debug, error};

pub const FALLBACK_NOTICE: &str = "Could not generate summary. Showing raw chunks:";

/// Token bounds for the per-chunk summaries.
pub const CHUNK_SUMMARY_LEN: (usize, usize) = (40, 120);
/// Token bounds for the final summary of the combined partials.
pub const FINAL_SUMMARY_LEN: (usize, usize) = (60, 150);

/// Text to text boundary. Implementations must decode deterministically.
pub trait Summarizer: Send + Sync {
    fn summarize<'a>(
        &'a self,
        text: &'a str,
        min_len: usize,
        max_len: usize,
    ) -> BoxFuture<'a, Result<String, LlmError>>;
}

/// Summarizer that prompts a chat model with greedy decoding.
#[derive(Debug, Clone)]
pub struct LlmSummarizer {
    client: Client,
    provider: Provider,
    model: String,
}

impl LlmSummarizer {
    pub fn new(client: Client, provider: Provider, model: impl Into<String>) -> Self {
        Self {
            client,
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, text: &str, min_len: usize, max_len: usize) -> ChatRequest {
        let instructions = format!(
            "Summarize the text supplied by the user. Write between {} and {} tokens of plain prose. \
             Use only facts stated in the text and do not add a preamble.",
            min_len, max_len
        );
        ChatRequest {
            messages: vec![ChatMessage::system(instructions), ChatMessage::user(text)],
            model: self.model.clone(),
            temperature: Some(0.0),
            max_tokens: u32::try_from(max_len).ok(),
        }
    }
}

impl Summarizer for LlmSummarizer {
    fn summarize<'a>(
        &'a self,
        text: &'a str,
        min_len: usize,
        max_len: usize,
    ) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(async move {
            if text.trim().is_empty() {
                return Err(LlmError::Parse("nothing to summarize".into()));
            }
            let request = self.request(text, min_len, max_len);
            let response = self.provider.chat(&self.client, &request).await?;
            Ok(response.content)
        })
    }
}

/// Summarize each chunk, then summarize the joined partial summaries.
///
/// Never fails: on any error the chunks are returned verbatim behind
/// [`FALLBACK_NOTICE`].
pub async fn summarize_chunks(summarizer: &dyn Summarizer, chunks: &[&str]) -> String {
    match reduce(summarizer, chunks).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Summarization failed: {}", e);
            fallback(chunks)
        }
    }
}

async fn reduce(summarizer: &dyn Summarizer, chunks: &[&str]) -> Result<String, LlmError> {
    if chunks.is_empty() {
        return Err(LlmError::Parse("no chunks to summarize".into()));
    }

    let (min_len, max_len) = CHUNK_SUMMARY_LEN;
    let mut partials = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let partial = summarizer.summarize(chunk, min_len, max_len).await?;
        partials.push(partial.trim().to_string());
    }
    let combined = partials.join(" ");
    debug!(partials = partials.len(), "combining partial summaries");

    let (min_len, max_len) = FINAL_SUMMARY_LEN;
    let summary = summarizer.summarize(&combined, min_len, max_len).await?;
    let summary = summary.trim();
    if summary.is_empty() {
        return Err(LlmError::Parse("model returned an empty summary".into()));
    }
    Ok(summary.to_string())
}

fn fallback(chunks: &[&str]) -> String {
    format!("{}\n{}", FALLBACK_NOTICE, chunks.join("\n"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every call and answers with `"<summary of N chars>"`.
    #[derive(Default)]
    pub(crate) struct RecordingSummarizer {
        pub calls: Mutex<Vec<(String, usize, usize)>>,
    }

    impl Summarizer for RecordingSummarizer {
        fn summarize<'a>(
            &'a self,
            text: &'a str,
            min_len: usize,
            max_len: usize,
        ) -> BoxFuture<'a, Result<String, LlmError>> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), min_len, max_len));
            let out = format!(" summary of {} ", text.len());
            Box::pin(async move { Ok(out) })
        }
    }

    pub(crate) struct FailingSummarizer;

    impl Summarizer for FailingSummarizer {
        fn summarize<'a>(
            &'a self,
            _text: &'a str,
            _min_len: usize,
            _max_len: usize,
        ) -> BoxFuture<'a, Result<String, LlmError>> {
            Box::pin(async { Err(LlmError::Parse("model unavailable".into())) })
        }
    }

    #[tokio::test]
    async fn test_map_then_reduce() {
        let summarizer = RecordingSummarizer::default();
        let out = summarize_chunks(&summarizer, &["aaaa", "bb"]).await;

        let calls = summarizer.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], ("aaaa".to_string(), 40, 120));
        assert_eq!(calls[1], ("bb".to_string(), 40, 120));
        assert_eq!(
            calls[2],
            ("summary of 4 summary of 2".to_string(), 60, 150)
        );
        assert_eq!(out, "summary of 25");
    }

    #[tokio::test]
    async fn test_fallback_contains_every_chunk() {
        let chunks = ["first chunk text", "second chunk text", "third"];
        let out = summarize_chunks(&FailingSummarizer, &chunks).await;
        assert!(out.starts_with(FALLBACK_NOTICE));
        for chunk in chunks {
            assert!(out.contains(chunk));
        }
        assert_eq!(
            out,
            "Could not generate summary. Showing raw chunks:\nfirst chunk text\nsecond chunk text\nthird"
        );
    }

    #[tokio::test]
    async fn test_no_chunks_falls_back() {
        let out = summarize_chunks(&RecordingSummarizer::default(), &[]).await;
        assert!(out.starts_with(FALLBACK_NOTICE));
    }

    #[tokio::test]
    async fn test_llm_summarizer_uses_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": "condensed" } } ]
            })))
            .expect(3)
            .mount(&server)
            .await;

        let provider = Provider::OpenAi(crate::llm::openai::OpenAiConfig {
            api_key: "sk-test".into(),
            base_url: server.uri(),
        });
        let summarizer = LlmSummarizer::new(Client::new(), provider, "gpt-4o-mini");
        let out = summarize_chunks(&summarizer, &["one", "two"]).await;
        assert_eq!(out, "condensed");
    }

    #[test]
    fn test_request_is_greedy_and_bounded() {
        let summarizer = LlmSummarizer::new(Client::new(), Provider::openai("k".into()), "m");
        let request = summarizer.request("text", 40, 120);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(120));
        assert!(request.messages[0].content.contains("between 40 and 120 tokens"));
    }
}
