//! Research pipeline: search, select relevant URLs, scrape them.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use researchkit_shared::{ResearchOutput, ResearchResult, Result, SearchCandidate};

use crate::selector::UrlSelector;
use crate::tools::{ScrapeTool, SearchTool, is_scrape_failure};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// A new phase started ("searching", "selecting", "scraping").
    fn phase(&self, name: &str);
    /// Search returned candidates.
    fn candidates_found(&self, count: usize);
    /// One selected URL has been scraped.
    fn url_scraped(&self, url: &str, current: usize, total: usize);
    /// The run completed.
    fn done(&self, output: &ResearchOutput);
}

/// No-op progress reporter.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn candidates_found(&self, _count: usize) {}
    fn url_scraped(&self, _url: &str, _current: usize, _total: usize) {}
    fn done(&self, _output: &ResearchOutput) {}
}

// ---------------------------------------------------------------------------
// ResearchAgent
// ---------------------------------------------------------------------------

/// Runs one topic through search → select → scrape.
pub struct ResearchAgent {
    search: Arc<dyn SearchTool>,
    scrape: Arc<dyn ScrapeTool>,
    selector: UrlSelector,
}

impl ResearchAgent {
    pub fn new(
        search: Arc<dyn SearchTool>,
        scrape: Arc<dyn ScrapeTool>,
        selector: UrlSelector,
    ) -> Self {
        Self {
            search,
            scrape,
            selector,
        }
    }

    pub fn selector(&self) -> &UrlSelector {
        &self.selector
    }

    pub async fn run_research(&mut self, topic: &str) -> Result<ResearchOutput> {
        self.run_research_with(topic, &SilentProgress).await
    }

    /// Research `topic`, reporting each phase to `progress`.
    ///
    /// Pages that scrape to nothing or to a failure report are dropped; the
    /// remaining results keep the selector's order.
    #[instrument(skip_all, fields(topic = %topic))]
    pub async fn run_research_with(
        &mut self,
        topic: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<ResearchOutput> {
        progress.phase("searching");
        let candidates: Vec<SearchCandidate> = self.search.search(topic).await?;
        progress.candidates_found(candidates.len());
        debug!(count = candidates.len(), "search complete");

        progress.phase("selecting");
        self.selector.set_topic(topic);
        let selected = self.selector.select(&candidates).await?;

        progress.phase("scraping");
        let total = selected.len();
        let mut results = Vec::with_capacity(total);
        for (i, url) in selected.into_iter().enumerate() {
            let content = self.scrape.scrape(&url).await;
            progress.url_scraped(&url, i + 1, total);

            if content.trim().is_empty() {
                debug!(%url, "empty page skipped");
                continue;
            }
            if is_scrape_failure(&content) {
                debug!(%url, "failed scrape skipped");
                continue;
            }
            results.push(ResearchResult { url, content });
        }

        let output = ResearchOutput {
            topic: topic.to_string(),
            results,
        };
        info!(
            candidates = candidates.len(),
            selected = total,
            kept = output.results.len(),
            "research complete"
        );
        progress.done(&output);
        Ok(output)
    }
}
