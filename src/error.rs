use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// A completion arrived for a path that was not recorded as in flight.
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    #[error("listing {prefix} failed: {source:#}")]
    Discovery {
        prefix: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("could not start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl DispatchError {
    /// True for the two context errors that end admission.
    pub fn is_context_done(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}
