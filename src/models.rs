use serde::{Deserialize, Serialize};

/// A wiki page as returned by the content API.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Page {
    pub id: String,
    pub title: String,
    pub body_html: String,
    pub webui_path: Option<String>,
}

impl Page {
    /// Direct link to the page, falling back to a `/pages/{id}` path when the
    /// API did not report a web UI link.
    pub fn url(&self, base_url: &str) -> String {
        match &self.webui_path {
            Some(path) => format!("{}{}", base_url, path),
            None => format!("{}/pages/{}", base_url, self.id),
        }
    }
}

/// A bounded slice of normalized page text, the unit of retrieval.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub page_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(webui: Option<&str>) -> Page {
        Page {
            id: "42".into(),
            title: "Onboarding Guide".into(),
            body_html: String::new(),
            webui_path: webui.map(String::from),
        }
    }

    #[test]
    fn test_url_uses_webui_path() {
        let p = page(Some("/spaces/ENG/pages/42/Onboarding+Guide"));
        assert_eq!(
            p.url("https://example.atlassian.net/wiki"),
            "https://example.atlassian.net/wiki/spaces/ENG/pages/42/Onboarding+Guide"
        );
    }

    #[test]
    fn test_url_falls_back_to_page_id() {
        let p = page(None);
        assert_eq!(
            p.url("https://example.atlassian.net/wiki"),
            "https://example.atlassian.net/wiki/pages/42"
        );
    }
}
