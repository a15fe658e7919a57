//! Content generation and its resilience layer.
//!
//! [`ContentGenerator`] is the narrow seam to an external text-generation
//! service: one call, one streamed response, with quota exhaustion and
//! service unavailability reported as distinct [`GenerationError`] variants.
//! [`ResilientGenerator`] wraps any generator with credential rotation over
//! an [`ApiKeyPool`], bounded backoff and a per-attempt timeout.
//!
//! [`TaskPool`] is a separate, bounded-concurrency runner for batches of
//! independent generation requests. The step engine never uses it.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod openai;
pub mod pool;
pub mod resilient;
pub mod task_pool;

pub use openai::OpenAiCompatibleGenerator;
pub use pool::{ApiKey, ApiKeyPool};
pub use resilient::ResilientGenerator;
pub use task_pool::{TaskOutcome, TaskPool};

/// Failures reported by a generation service or by the resilience layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation cancelled")]
    Cancelled,
    /// The active credential hit its quota or rate limit
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    /// The service reported itself unavailable or overloaded
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Generation request timed out after {secs}s")]
    Timeout { secs: u64 },
    /// Any other request failure; never retried by the resilience layer
    #[error("Generation request failed: {0}")]
    Request(String),
    #[error("All {pool_size} API key(s) in the pool have exceeded their quota")]
    QuotaExhausted { pool_size: usize },
    #[error("Service unavailable after {attempts} attempt(s): {message}")]
    ServiceUnavailableExhausted { attempts: u32, message: String },
    #[error("No API keys configured; set WAYMARK_API_KEYS or pass --api-key")]
    NoCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One logical generation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    /// Prior conversation, oldest first
    pub history: Vec<ChatMessage>,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// The full message list: system prompt, history, then the prompt.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(self.prompt.clone()));
        messages
    }
}

/// Streamed text chunks of one response.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// An external text-generation service.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Starts one request with the given credential.
    ///
    /// Implementations must report quota exhaustion as
    /// [`GenerationError::QuotaExceeded`] and overload as
    /// [`GenerationError::ServiceUnavailable`], and should stop producing
    /// chunks once `cancel` fires.
    async fn stream(
        &self,
        credential: &ApiKey,
        model: &str,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, GenerationError>;
}

/// Notifications from the resilience layer.
pub trait GenerationListener: Send + Sync {
    /// The active credential moved from index `from` to index `to`.
    fn credential_switched(&self, _from: usize, _to: usize, _pool_size: usize) {}

    /// A "service unavailable" retry is about to sleep for `delay`.
    fn unavailable_retry(&self, _attempt: u32, _delay: Duration) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl GenerationListener for NoopListener {}
