//! The LLM completion boundary.
//!
//! The rest of the system depends on exactly one operation:
//! `complete(prompt) -> response text`. The response is free text — the
//! system depends only on the model tending to honor the requested
//! fenced-JSON schema, never on a structured-output mode, so everything
//! past this boundary goes through the extractor.

pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::errors::TransportError;

/// A text-completion backend. Implementations must be stateless per call;
/// services never retry internally on top of this.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, TransportError>;
}
