use thiserror::Error;

/// Error type for device discovery operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An OS query on an input node failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to initialize the input backend.
    #[error("Backend init failed: {0}")]
    BackendInit(String),
    /// The discovery thread is no longer running.
    #[error("Discovery runtime has stopped")]
    RuntimeStopped,
    /// The command channel to the runtime thread is closed.
    #[error("Command channel closed")]
    ChannelClosed,
}

/// Convenient result alias for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;
