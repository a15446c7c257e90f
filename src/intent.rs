use crate::models::Page;
use serde::Serialize;

pub const LINK_TRIGGERS: &[&str] = &["link", "url", "page", "reference", "location", "source of"];
pub const CONTENT_TRIGGERS: &[&str] = &["explain", "describe", "summarize", "started", "origin", "details"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Link,
    Content,
}

/// Classify a query by case-insensitive substring matching.
///
/// Content triggers override link triggers; with no link trigger the query is
/// a content question.
pub fn detect_intent(query: &str) -> Intent {
    let q = query.to_lowercase();
    if LINK_TRIGGERS.iter().any(|t| q.contains(t)) {
        if CONTENT_TRIGGERS.iter().any(|t| q.contains(t)) {
            return Intent::Content;
        }
        return Intent::Link;
    }
    Intent::Content
}

/// The last word of the query that is not a link trigger, lower-cased and
/// stripped of surrounding punctuation.
pub fn extract_keyword(query: &str) -> Option<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .rev()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|w| !w.is_empty() && !LINK_TRIGGERS.contains(w))
        .map(str::to_string)
}

/// One `"{title}: {url}"` line per page whose title contains `keyword`.
pub fn links_for_keyword(pages: &[Page], base_url: &str, keyword: &str) -> Vec<String> {
    if keyword.is_empty() {
        return Vec::new();
    }
    pages
        .iter()
        .filter(|page| page.title.to_lowercase().contains(keyword))
        .map(|page| format!("{}: {}", page.title, page.url(base_url)))
        .collect()
}

/// Answer a link-seeking query with direct page URLs.
pub fn page_links(pages: &[Page], base_url: &str, query: &str) -> String {
    let keyword = extract_keyword(query).unwrap_or_default();
    let matches = links_for_keyword(pages, base_url, &keyword);
    if matches.is_empty() {
        format!("No matching page found for '{}'.", keyword)
    } else {
        matches.join("\n")
    }
}
