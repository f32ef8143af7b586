//! Error types for the context cache.

use today_test_core::BoxError;

/// Errors surfaced by the context cache and its loader delegate.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// The loader failed to build a context. Failed loads are never cached.
    #[error("failed to load application context for {key}")]
    Load {
        /// Description of the configuration that failed to load.
        key: String,
        /// The loader's error.
        #[source]
        source: BoxError,
    },

    /// A configuration value was rejected.
    #[error("invalid context cache configuration: {message}")]
    InvalidConfiguration {
        /// What was wrong.
        message: String,
    },
}

impl ContextError {
    /// Returns true if this error comes from a failed context load.
    pub fn is_load_failure(&self) -> bool {
        matches!(self, ContextError::Load { .. })
    }

    /// The loader's original error, if this is a load failure.
    pub fn load_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ContextError::Load { source, .. } => Some(source.as_ref()),
            ContextError::InvalidConfiguration { .. } => None,
        }
    }
}

/// Result type for context cache operations.
pub type Result<T> = std::result::Result<T, ContextError>;
