//! Topic research for ResearchKit.
//!
//! Search hits are scored by a language model ([`UrlSelector`]), the relevant
//! ones are scraped ([`HttpScraper`]), and [`ResearchAgent`] ties the steps
//! together into a [`ResearchOutput`](researchkit_shared::ResearchOutput).

pub mod pipeline;
pub mod prompt;
pub mod scores;
pub mod scrape;
pub mod selector;
pub mod tools;

pub use pipeline::{ProgressReporter, ResearchAgent, SilentProgress};
pub use scores::{RelevanceScore, RelevanceScoreSet};
pub use scrape::{HttpScraper, html_to_markdown};
pub use selector::UrlSelector;
pub use tools::{
    SCRAPE_FAILURE_PREFIX, ScrapeTool, SearchTool, StaticSearch, is_scrape_failure,
    scrape_failure,
};
