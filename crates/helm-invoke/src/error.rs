use thiserror::Error;

/// Error taxonomy for one invocation. Every failure surfaces through
/// this enum; there is no partial-success state.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// Parameter validation failed before any external side effect.
    #[error("invalid parameters: {message}")]
    Validation { message: String },

    /// The credential artifact could not be written or locked down.
    #[error("failed to materialize credential artifact: {message}")]
    Materialization { message: String },

    /// The sandbox runtime could not be spawned at all.
    #[error("failed to spawn '{runtime}': {source}")]
    Spawn {
        runtime: String,
        #[source]
        source: std::io::Error,
    },

    /// The invoked tool reported failure. `stderr` is already redacted.
    #[error("execution failed: {stderr}")]
    Execution { stderr: String },
}

impl InvokeError {
    pub fn validation(message: impl Into<String>) -> Self {
        InvokeError::Validation {
            message: message.into(),
        }
    }

    pub fn materialization(message: impl Into<String>) -> Self {
        InvokeError::Materialization {
            message: message.into(),
        }
    }
}
