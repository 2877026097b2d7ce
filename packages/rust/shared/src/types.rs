//! Core domain types for the research pipeline.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SearchCandidate
// ---------------------------------------------------------------------------

/// One external search hit, as produced by a search tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    /// Result URL.
    pub url: String,
    /// Result title.
    #[serde(default)]
    pub title: String,
    /// Summary or snippet supplied by the search tool.
    #[serde(default, alias = "snippet", skip_serializing_if = "Option::is_none")]
    pub summarised_content: Option<String>,
}

impl SearchCandidate {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            summarised_content: None,
        }
    }

    /// Attach the summarised content.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summarised_content = Some(summary.into());
        self
    }

    /// Summary text, empty when absent.
    pub fn summary(&self) -> &str {
        self.summarised_content.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Research output
// ---------------------------------------------------------------------------

/// A single piece of scraped content from a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    /// Source URL of the content.
    pub url: String,
    /// Scraped textual content.
    pub content: String,
}

/// Consolidated output of a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    /// The original research topic.
    pub topic: String,
    /// Results from the sources judged relevant.
    pub results: Vec<ResearchResult>,
}
