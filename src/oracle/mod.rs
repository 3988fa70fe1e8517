//! Text oracle capability
//!
//! The matcher only ever needs `complete(prompt, schema) -> text`. Transport,
//! model choice and authentication live behind this trait so matching logic
//! can run against a deterministic stub.

mod ollama;
mod parse;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use ollama::OllamaOracle;
pub use parse::{first_balanced_object, parse_lenient, strip_code_fence};

/// Oracle call errors. All of them are recoverable for the matcher.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Oracle call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

/// Natural-language completion capability
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete `prompt`, asking for output shaped like `schema`
    async fn complete(&self, prompt: &str, schema: &Value) -> Result<String, OracleError>;

    /// Check the oracle can serve requests
    async fn is_available(&self) -> bool {
        true
    }
}

/// Bounds every call of the wrapped oracle
pub struct TimeoutOracle {
    inner: Arc<dyn Oracle>,
    timeout: Duration,
}

impl TimeoutOracle {
    pub fn new(inner: Arc<dyn Oracle>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Oracle for TimeoutOracle {
    async fn complete(&self, prompt: &str, schema: &Value) -> Result<String, OracleError> {
        match tokio::time::timeout(self.timeout, self.inner.complete(prompt, schema)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.timeout.as_secs())),
        }
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}

/// Oracle answering from a synchronous function of the prompt and schema.
///
/// Useful for deterministic stubs and offline runs.
pub struct FnOracle<F> {
    respond: F,
}

impl<F> FnOracle<F>
where
    F: Fn(&str, &Value) -> Result<String, OracleError> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl<F> Oracle for FnOracle<F>
where
    F: Fn(&str, &Value) -> Result<String, OracleError> + Send + Sync,
{
    async fn complete(&self, prompt: &str, schema: &Value) -> Result<String, OracleError> {
        (self.respond)(prompt, schema)
    }
}
