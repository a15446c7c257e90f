use crate::assistant::KnowledgeBase;
use crate::embedding::EmbeddingError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PageInfo {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChunkInfo {
    pub chunk_index: usize,
    pub content: String,
    pub page_title: Option<String>,
    pub score: f32,
}

pub fn list_pages(kb: &KnowledgeBase) -> Vec<PageInfo> {
    kb.pages()
        .iter()
        .map(|p| PageInfo {
            id: p.id.clone(),
            title: p.title.clone(),
            url: p.url(kb.base_url()),
        })
        .collect()
}

/// Search knowledge base for chunks relevant to a query
pub async fn search_knowledge_base(
    kb: &KnowledgeBase,
    query: &str,
    top_k: usize,
) -> Result<Vec<ChunkInfo>, EmbeddingError> {
    let ranked = kb.search(query, top_k).await?;
    Ok(ranked
        .into_iter()
        .map(|r| ChunkInfo {
            chunk_index: r.index,
            content: r.chunk.text.clone(),
            page_title: r
                .chunk
                .page_id
                .as_deref()
                .and_then(|id| kb.page(id))
                .map(|p| p.title.clone()),
            score: r.score,
        })
        .collect())
}

pub fn render_chunks(chunks: &[ChunkInfo]) -> String {
    if chunks.is_empty() {
        return "No chunks available.".to_string();
    }
    chunks
        .iter()
        .map(|c| {
            format!(
                "[{:.3}] #{} ({})\n{}",
                c.score,
                c.chunk_index,
                c.page_title.as_deref().unwrap_or("unknown page"),
                c.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::tests::FixedEmbedder;
    use crate::models::{Chunk, Page};
    use crate::summarizer::tests::FailingSummarizer;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(
            "https://wiki.example.com/wiki",
            vec![Page {
                id: "9".into(),
                title: "Travel Policy".into(),
                body_html: String::new(),
                webui_path: None,
            }],
            vec![
                Chunk {
                    text: "book flights early".into(),
                    page_id: Some("9".into()),
                },
                Chunk {
                    text: "orphan".into(),
                    page_id: None,
                },
            ],
            3,
            Box::new(FixedEmbedder::new(&[
                ("flights", vec![1.0, 0.0]),
                ("book flights early", vec![1.0, 0.0]),
                ("orphan", vec![0.0, 1.0]),
            ])),
            Box::new(FailingSummarizer),
        )
    }

    #[test]
    fn test_list_pages() {
        let pages = list_pages(&kb());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "https://wiki.example.com/wiki/pages/9");
    }

    #[tokio::test]
    async fn test_search_reports_source_page() {
        let kb = kb();
        let hits = search_knowledge_base(&kb, "flights", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].page_title.as_deref(), Some("Travel Policy"));
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].page_title, None);

        let rendered = render_chunks(&hits);
        assert!(rendered.starts_with("[1.000] #0 (Travel Policy)\nbook flights early"));
    }
}
