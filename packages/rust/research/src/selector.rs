//! Model-judged URL selection.
//!
//! Given a topic and a batch of search hits, ask the model to score every hit,
//! check that the scoring covers the batch, and keep the URLs at or above the
//! relevance threshold. A scoring that is malformed or incomplete re-issues
//! the whole round trip, up to `max_round_trips` times.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use researchkit_llm::{Invoker, extract_json};
use researchkit_shared::{ResearchKitError, Result, SearchCandidate, SelectionConfig};

use crate::prompt::relevance_prompt;
use crate::scores::RelevanceScoreSet;

/// Picks the search results worth scraping for one topic.
///
/// Single-owner: use one selector per concurrently researched topic.
#[derive(Debug)]
pub struct UrlSelector {
    invoker: Invoker,
    topic: String,
    config: SelectionConfig,
}

impl UrlSelector {
    pub fn new(invoker: Invoker, topic: impl Into<String>, config: SelectionConfig) -> Self {
        Self {
            invoker,
            topic: topic.into(),
            config,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Point the selector at a new topic between research runs.
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = topic.into();
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// URLs from `candidates` scored at or above the threshold, in the order
    /// the model emitted them.
    ///
    /// Engine exhaustion is returned as-is. Running out of round trips yields
    /// [`ResearchKitError::SelectionExhausted`] carrying the last raw reply.
    #[instrument(skip_all, fields(topic = %self.topic, candidates = candidates.len()))]
    pub async fn select(&self, candidates: &[SearchCandidate]) -> Result<Vec<String>> {
        if candidates.is_empty() {
            debug!("no candidates, skipping model call");
            return Ok(Vec::new());
        }
        let max_rounds = self.config.max_round_trips;
        if max_rounds == 0 {
            return Err(ResearchKitError::validation(
                "max_round_trips must be at least 1",
            ));
        }

        let known: HashSet<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        let prompt = relevance_prompt(&self.topic, candidates);

        let mut reason = String::new();
        let mut last_response = None;

        for round in 1..=max_rounds {
            let (raw, value) = self.score_round(&prompt).await?;

            match self.evaluate(&value, &known) {
                Ok(scores) => {
                    let selected = self.filter(&scores, &known);
                    info!(
                        round,
                        scored = scores.len(),
                        selected = selected.len(),
                        threshold = self.config.relevance_threshold,
                        "urls selected"
                    );
                    return Ok(selected);
                }
                Err(e) => {
                    warn!(round, max_rounds, error = %e, "relevance scoring rejected");
                    reason = e.to_string();
                    last_response = Some(raw);
                }
            }
        }

        Err(ResearchKitError::SelectionExhausted {
            rounds: max_rounds,
            reason,
            last_response,
        })
    }

    /// One structured-mode engine call, keeping the raw completion alongside
    /// the parsed JSON.
    async fn score_round(&self, prompt: &str) -> Result<(String, Value)> {
        self.invoker
            .invoke(
                prompt,
                |raw| Ok((raw.to_string(), extract_json(raw)?)),
                |failure| failure.into_error("failed to parse JSON response"),
            )
            .await
    }

    /// Parse one scoring and check it covers the candidate set.
    fn evaluate(&self, value: &Value, known: &HashSet<&str>) -> Result<RelevanceScoreSet> {
        let scores = RelevanceScoreSet::from_json(value)?;

        let missing: Vec<&str> = known
            .iter()
            .copied()
            .filter(|url| !scores.contains(url))
            .collect();
        let complete = missing.is_empty() && scores.len() == known.len();

        if !complete {
            if self.config.strict_coverage {
                return Err(ResearchKitError::validation(format!(
                    "scored {} url(s) for {} candidate(s); missing: [{}]",
                    scores.len(),
                    known.len(),
                    missing.join(", ")
                )));
            }
            warn!(
                scored = scores.len(),
                candidates = known.len(),
                missing = missing.len(),
                "incomplete relevance scoring accepted"
            );
        }

        Ok(scores)
    }

    fn filter(&self, scores: &RelevanceScoreSet, known: &HashSet<&str>) -> Vec<String> {
        scores
            .iter()
            .filter(|s| known.contains(s.url.as_str()))
            .filter(|s| s.relevance >= self.config.relevance_threshold)
            .map(|s| s.url.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use researchkit_llm::{RetryPolicy, ScriptedModel, Step};
    use std::sync::Arc;

    fn candidates() -> Vec<SearchCandidate> {
        vec![
            SearchCandidate::new("urlA", "Deep learning survey").with_summary("neural nets"),
            SearchCandidate::new("urlB", "Sourdough basics").with_summary("bread"),
            SearchCandidate::new("urlC", "History of AI").with_summary("symbolic ai"),
        ]
    }

    fn selector(model: &Arc<ScriptedModel>, config: SelectionConfig) -> UrlSelector {
        let invoker = Invoker::new(model.clone(), RetryPolicy::default());
        UrlSelector::new(invoker, "artificial intelligence", config)
    }

    fn threshold(value: f64) -> SelectionConfig {
        SelectionConfig {
            relevance_threshold: value,
            ..SelectionConfig::default()
        }
    }

    const FULL_SCORING: &str = r#"```json
[
  {"url": "urlA", "relevance": "9", "rationale": "core topic"},
  {"url": "urlB", "relevance": "2", "rationale": "unrelated"},
  {"url": "urlC", "relevance": "8", "rationale": "background"}
]
```"#;

    #[tokio::test(start_paused = true)]
    async fn keeps_scores_at_or_above_threshold_in_order() {
        let model = Arc::new(ScriptedModel::new([Step::reply(FULL_SCORING)]));
        let selected = selector(&model, threshold(6.0))
            .select(&candidates())
            .await
            .unwrap();
        assert_eq!(selected, ["urlA", "urlC"]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_is_inclusive() {
        let model = Arc::new(ScriptedModel::new([Step::reply(FULL_SCORING)]));
        let selected = selector(&model, threshold(8.0))
            .select(&candidates())
            .await
            .unwrap();
        assert_eq!(selected, ["urlA", "urlC"]);
    }

    #[tokio::test(start_paused = true)]
    async fn follows_emission_order() {
        let reply = r#"[
            {"url": "urlC", "relevance": 8, "rationale": ""},
            {"url": "urlB", "relevance": 1, "rationale": ""},
            {"url": "urlA", "relevance": 9, "rationale": ""}
        ]"#;
        let model = Arc::new(ScriptedModel::new([Step::reply(reply)]));
        let selected = selector(&model, threshold(6.0))
            .select(&candidates())
            .await
            .unwrap();
        assert_eq!(selected, ["urlC", "urlA"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_candidates_short_circuit() {
        let model = Arc::new(ScriptedModel::new([Step::reply("[]")]));
        let selected = selector(&model, SelectionConfig::default())
            .select(&[])
            .await
            .unwrap();
        assert!(selected.is_empty());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn incomplete_coverage_retries_round_trip() {
        let partial = r#"[
            {"url": "urlA", "relevance": 3, "rationale": ""},
            {"url": "urlC", "relevance": 3, "rationale": ""}
        ]"#;
        let model = Arc::new(ScriptedModel::new([
            Step::reply(partial),
            Step::reply(FULL_SCORING),
        ]));
        let selected = selector(&model, threshold(6.0))
            .select(&candidates())
            .await
            .unwrap();

        assert_eq!(model.calls(), 2);
        // Only the second scoring counts: urlA/urlC were 3 in the first one.
        assert_eq!(selected, ["urlA", "urlC"]);
        let prompts = model.prompts();
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_relevance_retries_instead_of_failing() {
        let bad = r#"[
            {"url": "urlA", "relevance": "high", "rationale": ""},
            {"url": "urlB", "relevance": "2", "rationale": ""},
            {"url": "urlC", "relevance": "8", "rationale": ""}
        ]"#;
        let model = Arc::new(ScriptedModel::new([Step::reply(bad), Step::reply(FULL_SCORING)]));
        let selected = selector(&model, threshold(6.0))
            .select(&candidates())
            .await
            .unwrap();
        assert_eq!(selected, ["urlA", "urlC"]);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hallucinated_url_never_selected() {
        let reply = r#"[
            {"url": "urlA", "relevance": 9, "rationale": ""},
            {"url": "urlB", "relevance": 2, "rationale": ""},
            {"url": "urlC", "relevance": 8, "rationale": ""},
            {"url": "urlZ", "relevance": 10, "rationale": "made up"}
        ]"#;
        let model = Arc::new(ScriptedModel::new([Step::reply(reply)]));
        let config = SelectionConfig {
            strict_coverage: false,
            ..threshold(6.0)
        };
        let selected = selector(&model, config).select(&candidates()).await.unwrap();
        assert_eq!(selected, ["urlA", "urlC"]);
    }

    #[tokio::test(start_paused = true)]
    async fn hallucinated_url_fails_strict_coverage() {
        let with_extra = r#"[
            {"url": "urlA", "relevance": 9, "rationale": ""},
            {"url": "urlB", "relevance": 2, "rationale": ""},
            {"url": "urlC", "relevance": 8, "rationale": ""},
            {"url": "urlA/", "relevance": 10, "rationale": "near miss"}
        ]"#;
        let model = Arc::new(ScriptedModel::new([
            Step::reply(with_extra),
            Step::reply(FULL_SCORING),
        ]));
        let selected = selector(&model, threshold(6.0))
            .select(&candidates())
            .await
            .unwrap();
        assert_eq!(model.calls(), 2);
        assert!(!selected.contains(&"urlA/".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn lenient_coverage_accepts_partial_scoring() {
        let partial = r#"[{"url": "urlA", "relevance": 9, "rationale": ""}]"#;
        let model = Arc::new(ScriptedModel::new([Step::reply(partial)]));
        let config = SelectionConfig {
            strict_coverage: false,
            ..threshold(6.0)
        };
        let selected = selector(&model, config).select(&candidates()).await.unwrap();
        assert_eq!(selected, ["urlA"]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn round_trips_are_bounded() {
        let partial = r#"[{"url": "urlA", "relevance": 9, "rationale": ""}]"#;
        let model = Arc::new(ScriptedModel::new([Step::reply(partial)]));
        let config = SelectionConfig {
            max_round_trips: 4,
            ..threshold(6.0)
        };
        let err = selector(&model, config)
            .select(&candidates())
            .await
            .unwrap_err();

        assert_eq!(model.calls(), 4);
        match &err {
            ResearchKitError::SelectionExhausted { rounds, reason, .. } => {
                assert_eq!(*rounds, 4);
                assert!(reason.contains("missing"));
            }
            other => panic!("expected SelectionExhausted, got {other:?}"),
        }
        assert!(err.last_response().unwrap().contains("urlA"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_keeps_raw_model_text() {
        let reply = "Here are my scores:\n```json\n[{\"url\": \"urlA\", \"relevance\": 9}]\n```\nHope this helps.";
        let model = Arc::new(ScriptedModel::new([Step::reply(reply)]));
        let err = selector(&model, SelectionConfig::default())
            .select(&candidates())
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchKitError::SelectionExhausted { .. }));
        assert_eq!(err.last_response(), Some(reply));
    }

    #[tokio::test(start_paused = true)]
    async fn engine_exhaustion_propagates() {
        let model = Arc::new(ScriptedModel::new([Step::reply("no json here")]));
        let err = selector(&model, SelectionConfig::default())
            .select(&candidates())
            .await
            .unwrap_err();
        // Default engine budget is 3 attempts; the selector does not re-enter.
        assert_eq!(model.calls(), 3);
        assert!(matches!(err, ResearchKitError::LlmExhausted { .. }));
        assert_eq!(err.last_response(), Some("no json here"));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_candidates_count_once() {
        let mut input = candidates();
        input.push(SearchCandidate::new("urlA", "Deep learning survey (mirror)"));
        let model = Arc::new(ScriptedModel::new([Step::reply(FULL_SCORING)]));
        let selected = selector(&model, threshold(6.0)).select(&input).await.unwrap();
        assert_eq!(selected, ["urlA", "urlC"]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn topic_can_be_reassigned() {
        let model = Arc::new(ScriptedModel::new([Step::reply(FULL_SCORING)]));
        let mut selector = selector(&model, SelectionConfig::default());
        selector.set_topic("machine learning");
        assert_eq!(selector.topic(), "machine learning");
        selector.select(&candidates()).await.unwrap();
        assert!(model.prompts()[0].contains("Topic: machine learning"));
    }
}
