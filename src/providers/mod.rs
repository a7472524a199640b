//! Provider bindings: one per hosted backend, each turning a chat history into
//! a stream of text chunks in that vendor's wire format.

pub mod google;
pub mod zhipu;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::config::Provider;
use crate::error::StreamError;
use crate::llm::ChatTurn;
use crate::streaming::ChunkStream;

pub use google::GoogleProvider;
pub use zhipu::ZhipuProvider;

/// Capability shared by every backend: stream a reply to a history
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    fn kind(&self) -> Provider;

    /// Send `history` (oldest first, newest user message last) and return the
    /// reply as text chunks. Errors before the first byte of the reply are
    /// returned directly; later ones arrive inside the stream.
    async fn open(&self, history: Vec<ChatTurn>) -> Result<ChunkStream, StreamError>;
}

/// Where each backend is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base URL of the Generative Language API
    pub google_base: String,
    /// Full chat-completions URL of the BigModel API
    pub zhipu_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            google_base: google::GOOGLE_API_BASE.to_string(),
            zhipu_url: zhipu::ZHIPU_CHAT_URL.to_string(),
        }
    }
}

/// `{"error": {"message": ...}}` envelope both vendors use
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Reject non-success responses, logging whatever body came with them
pub(crate) async fn check_status(
    response: reqwest::Response,
    provider: Provider,
) -> Result<reqwest::Response, StreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(%provider, %status, %body, "provider returned an error status");
    Err(StreamError::Status { status })
}
