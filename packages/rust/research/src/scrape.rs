//! HTTP scraping: fetch a page, keep its main content, render it as Markdown.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use researchkit_shared::{ResearchKitError, Result, ScrapeConfig};

use crate::tools::{ScrapeTool, scrape_failure};

/// User-Agent string for page fetches.
const USER_AGENT: &str = concat!("ResearchKit/", env!("CARGO_PKG_VERSION"));

/// Content containers tried in order before falling back to `<body>`.
const CONTENT_SELECTORS: &[&str] = &[
    "article .markdown",
    ".vp-doc",
    ".markdown-section",
    "[role=\"main\"]",
    "article",
    "main",
    ".content",
];

const SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript", "svg", "form",
];

/// Scrapes pages over HTTP with a per-request timeout and a body size cap.
#[derive(Debug, Clone)]
pub struct HttpScraper {
    client: Client,
    max_bytes: u64,
}

impl HttpScraper {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ResearchKitError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }

    /// Fetch `url` and convert its content container to Markdown.
    pub async fn fetch_markdown(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| ResearchKitError::validation(format!("invalid url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ResearchKitError::validation(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| ResearchKitError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchKitError::Network(format!("HTTP {status}")));
        }
        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(self.too_large(len));
            }
        }

        // Content-Length can be absent or wrong, so the cap is enforced per chunk.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ResearchKitError::Network(format!("body read failed: {e}")))?
        {
            let total = (body.len() + chunk.len()) as u64;
            if total > self.max_bytes {
                return Err(self.too_large(total));
            }
            body.extend_from_slice(&chunk);
        }

        let html = String::from_utf8_lossy(&body);
        html_to_markdown(&html)
    }

    fn too_large(&self, len: u64) -> ResearchKitError {
        ResearchKitError::validation(format!(
            "page is {len} bytes, limit is {}",
            self.max_bytes
        ))
    }
}

#[async_trait]
impl ScrapeTool for HttpScraper {
    #[instrument(skip(self))]
    async fn scrape(&self, url: &str) -> String {
        match self.fetch_markdown(url).await {
            Ok(markdown) => {
                debug!(len = markdown.len(), "page scraped");
                markdown
            }
            Err(e) => {
                warn!(error = %e, "scrape failed");
                scrape_failure(url, e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Render the main content of an HTML document as Markdown.
pub fn html_to_markdown(html: &str) -> Result<String> {
    let content = extract_content_html(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();
    let markdown = converter
        .convert(&content)
        .map_err(|e| ResearchKitError::parse(format!("htmd conversion failed: {e}")))?;

    Ok(collapse_blank_lines(&markdown))
}

fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    for sel_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    if let Ok(body_sel) = Selector::parse("body") {
        if let Some(body) = doc.select(&body_sel).next() {
            return body.inner_html();
        }
    }

    html.to_string()
}

fn collapse_blank_lines(md: &str) -> String {
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    BLANK_RUN_RE.replace_all(md.trim(), "\n\n").into_owned()
}
