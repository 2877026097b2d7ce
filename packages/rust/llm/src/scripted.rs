//! Deterministic [`LanguageModel`] for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use researchkit_shared::{ResearchKitError, Result};

use crate::model::LanguageModel;

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(String),
}

impl Step {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// Replays a fixed sequence of outcomes. The final step repeats forever.
#[derive(Debug)]
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        let step = {
            let mut steps = self.steps.lock().unwrap_or_else(|e| e.into_inner());
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            }
        };

        match step {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Fail(message)) => Err(ResearchKitError::Llm(message)),
            None => Err(ResearchKitError::Llm("script is empty".into())),
        }
    }
}
