//! Resilient language-model invocation for ResearchKit.
//!
//! This crate provides:
//! - [`LanguageModel`]: the single capability every agent talks to
//! - [`Invoker`]: bounded retry with exponential backoff and response validation
//! - [`extract_json`]: tolerant JSON extraction from free-form model output
//! - [`OpenAiCompatModel`]: HTTP backend for OpenAI-compatible servers

pub mod cancel;
pub mod invoke;
pub mod json;
pub mod model;
pub mod openai;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use invoke::{AttemptRecord, InvocationFailure, Invoker, RetryPolicy};
pub use json::{extract_json, extract_json_as};
pub use model::LanguageModel;
pub use openai::OpenAiCompatModel;
#[cfg(any(test, feature = "testing"))]
pub use scripted::{ScriptedModel, Step};
