//! The model capability shared by every call site.

use async_trait::async_trait;

use researchkit_shared::Result;

/// A language-model backend that turns a prompt into a completion.
///
/// Implementations return `Err` for any failed call (transport error,
/// non-success status, empty reply). Callers never see backend specifics.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier used in logs (usually the model id).
    fn name(&self) -> &str;

    /// Send `prompt` and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
