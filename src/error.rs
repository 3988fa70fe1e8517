//! Error types
//!
//! Top-level error for annotation requests. Recoverable oracle failures never
//! surface here; they degrade the result instead.

use thiserror::Error;

use crate::prompts::PromptError;

/// Annotation request error
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// Rule set rejected before any work started
    #[error("Invalid rules: {0}")]
    InvalidRules(String),

    /// Engine configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Prompt template could not be rendered
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    /// Overall request deadline expired
    #[error("Annotation timed out after {0} seconds")]
    Timeout(u64),
}

/// Result type alias for annotation operations
pub type Result<T> = std::result::Result<T, AnnotateError>;
