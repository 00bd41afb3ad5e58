//! LLM provider adapters.
//!
//! Each provider implements the backend trait for its specific API.

mod anthropic;
mod gemini;

pub use anthropic::{AnthropicBackend, AnthropicBackendBuilder};
pub use gemini::GeminiBackend;

use crate::model::{Backend, ModelError, ModelRequest, ModelResponse};
use std::fmt;

/// A backend chosen at runtime from configuration.
pub enum Provider {
    Anthropic(AnthropicBackend),
    Gemini(GeminiBackend),
}

impl From<AnthropicBackend> for Provider {
    fn from(backend: AnthropicBackend) -> Self {
        Self::Anthropic(backend)
    }
}

impl From<GeminiBackend> for Provider {
    fn from(backend: GeminiBackend) -> Self {
        Self::Gemini(backend)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic(backend) => backend.fmt(f),
            Self::Gemini(backend) => backend.fmt(f),
        }
    }
}

impl Backend for Provider {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        match self {
            Self::Anthropic(backend) => backend.call(request).await,
            Self::Gemini(backend) => backend.call(request).await,
        }
    }
}
