//! Error types for ResearchKit.
//!
//! Library crates use [`ResearchKitError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ResearchKit operations.
#[derive(Debug, thiserror::Error)]
pub enum ResearchKitError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside of a model call (scraping, client setup).
    #[error("network error: {0}")]
    Network(String),

    /// A single model call failed (transport, backend status, empty reply).
    #[error("llm error: {0}")]
    Llm(String),

    /// The model output could not be decoded as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON with the wrong shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Input validation error (empty prompt, zero retry budget, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Every attempt of an invocation failed.
    #[error("{message} after {attempts} attempt(s): {last_error}{}", fmt_last_response(.last_response))]
    LlmExhausted {
        attempts: u32,
        message: String,
        last_error: String,
        last_response: Option<String>,
    },

    /// The selector ran out of round trips without a usable scoring.
    #[error("relevance scoring failed after {rounds} round trip(s): {reason}{}", fmt_last_response(.last_response))]
    SelectionExhausted {
        rounds: u32,
        reason: String,
        last_response: Option<String>,
    },

    /// The operation was cancelled while waiting to retry.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ResearchKitError>;

fn fmt_last_response(response: &Option<String>) -> String {
    match response {
        Some(text) => format!("\nlast response:\n{text}"),
        None => String::new(),
    }
}

impl ResearchKitError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The raw model response attached to a terminal error, if any.
    pub fn last_response(&self) -> Option<&str> {
        match self {
            Self::LlmExhausted { last_response, .. }
            | Self::SelectionExhausted { last_response, .. } => last_response.as_deref(),
            _ => None,
        }
    }
}
