//! Relevance scores as emitted by the model.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use researchkit_shared::{ResearchKitError, Result};

/// The model's judgement of one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceScore {
    pub url: String,
    pub relevance: f64,
    pub rationale: String,
}

/// Scores keyed by URL, iterated in emission order.
///
/// A URL emitted twice keeps its first position; the later score wins.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScoreSet {
    entries: Vec<RelevanceScore>,
    index: HashMap<String, usize>,
}

impl RelevanceScoreSet {
    pub fn insert(&mut self, score: RelevanceScore) {
        match self.index.get(&score.url) {
            Some(&pos) => self.entries[pos] = score,
            None => {
                self.index.insert(score.url.clone(), self.entries.len());
                self.entries.push(score);
            }
        }
    }

    pub fn get(&self, url: &str) -> Option<&RelevanceScore> {
        self.index.get(url).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelevanceScore> {
        self.entries.iter()
    }

    /// Parse the model's JSON: an array of `{url, relevance, rationale}`.
    ///
    /// `relevance` may be a number or a numeric string. Any entry that does
    /// not fit makes the whole response unusable.
    pub fn from_json(value: &Value) -> Result<Self> {
        let raw: Vec<RawScore> = serde_json::from_value(value.clone()).map_err(|e| {
            ResearchKitError::parse(format!("expected a list of relevance scores: {e}"))
        })?;

        let mut set = Self::default();
        for entry in raw {
            let relevance = coerce_relevance(&entry.relevance).ok_or_else(|| {
                ResearchKitError::parse(format!(
                    "relevance {} for {} is not a number",
                    entry.relevance, entry.url
                ))
            })?;
            set.insert(RelevanceScore {
                url: entry.url,
                relevance,
                rationale: rationale_text(entry.rationale),
            });
        }
        Ok(set)
    }
}

impl FromIterator<RelevanceScore> for RelevanceScoreSet {
    fn from_iter<I: IntoIterator<Item = RelevanceScore>>(iter: I) -> Self {
        let mut set = Self::default();
        for score in iter {
            set.insert(score);
        }
        set
    }
}

#[derive(Debug, Deserialize)]
struct RawScore {
    url: String,
    relevance: Value,
    #[serde(default)]
    rationale: Value,
}

fn coerce_relevance(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn rationale_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}
