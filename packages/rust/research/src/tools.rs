//! Search and scrape capabilities consumed by the research pipeline.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use researchkit_shared::{ResearchKitError, Result, SearchCandidate};

/// Prefix of every string a [`ScrapeTool`] returns in place of page content.
pub const SCRAPE_FAILURE_PREFIX: &str = "Failed to scrape";

/// Produces candidate URLs for a query.
#[async_trait]
pub trait SearchTool: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>>;
}

/// Fetches page text for a URL.
///
/// Never fails: an unreachable or unusable page yields
/// `"Failed to scrape <url>: <reason>"` (see [`scrape_failure`]).
#[async_trait]
pub trait ScrapeTool: Send + Sync {
    async fn scrape(&self, url: &str) -> String;
}

/// Format the failure string a scrape tool returns.
pub fn scrape_failure(url: &str, reason: impl std::fmt::Display) -> String {
    format!("{SCRAPE_FAILURE_PREFIX} {url}: {reason}")
}

/// Whether scraped text is a failure report rather than page content.
pub fn is_scrape_failure(content: &str) -> bool {
    content.contains(SCRAPE_FAILURE_PREFIX)
}

// ---------------------------------------------------------------------------
// StaticSearch
// ---------------------------------------------------------------------------

/// A search tool that returns the same fixed candidates for every query.
#[derive(Debug, Clone, Default)]
pub struct StaticSearch {
    candidates: Vec<SearchCandidate>,
}

impl StaticSearch {
    pub fn new(candidates: Vec<SearchCandidate>) -> Self {
        Self { candidates }
    }

    /// Load candidates from a JSON array of `{url, title, summarised_content}`
    /// (`snippet` is accepted for the summary).
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ResearchKitError::io(path, e))?;
        let candidates: Vec<SearchCandidate> = serde_json::from_str(&content).map_err(|e| {
            ResearchKitError::parse(format!("invalid candidates in {}: {e}", path.display()))
        })?;
        Ok(Self::new(candidates))
    }

    pub fn candidates(&self) -> &[SearchCandidate] {
        &self.candidates
    }
}

#[async_trait]
impl SearchTool for StaticSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>> {
        debug!(query, count = self.candidates.len(), "static search");
        Ok(self.candidates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("researchkit-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn static_search_ignores_query() {
        let search = StaticSearch::new(vec![SearchCandidate::new("https://a.example", "A")]);
        let first = search.search("rust").await.unwrap();
        let second = search.search("anything else").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn loads_candidates_from_json_file() {
        let path = temp_path("candidates.json");
        std::fs::write(
            &path,
            r#"[
                {"url": "https://a.example", "title": "A", "snippet": "about a"},
                {"url": "https://b.example"}
            ]"#,
        )
        .unwrap();

        let search = StaticSearch::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let candidates = search.candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].summary(), "about a");
        assert_eq!(candidates[1].title, "");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = StaticSearch::from_json_file(Path::new("/nonexistent/candidates.json"))
            .unwrap_err();
        assert!(matches!(err, ResearchKitError::Io { .. }));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let path = temp_path("bad.json");
        std::fs::write(&path, r#"{"url": "not a list"}"#).unwrap();
        let err = StaticSearch::from_json_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ResearchKitError::Parse { .. }));
    }

    #[test]
    fn failure_sentinel_round_trip() {
        let msg = scrape_failure("https://a.example", "HTTP 404");
        assert_eq!(msg, "Failed to scrape https://a.example: HTTP 404");
        assert!(is_scrape_failure(&msg));
        assert!(!is_scrape_failure("# A page\n\nreal content"));
    }
}
