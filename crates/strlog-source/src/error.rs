use std::path::PathBuf;

/// Errors raised by source drivers and readers.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A driver was constructed without a device path.
    #[error("device path must not be empty")]
    EmptyDevicePath,

    /// The operation is only valid before `init`.
    #[error("source driver already initialized")]
    AlreadyInitialized,

    /// The operation needs an initialized pipe.
    #[error("source pipe not initialized")]
    NotInitialized,

    /// The pipe has nowhere to deliver messages.
    #[error("source {id} has no destination attached")]
    NoDestination { id: String },

    /// Opening or configuring the log device failed.
    #[error(transparent)]
    Transport(#[from] strlog_transport::TransportError),

    /// No protocol factory was found for the driver.
    #[error("no server protocol named {name:?} is registered")]
    UnknownProtocol { name: String },

    /// Building or running the protocol failed.
    #[error("protocol error: {0}")]
    Proto(#[from] strlog_proto::ProtoError),

    /// Configuration could not be loaded or is invalid.
    #[error("invalid source configuration: {0}")]
    Config(String),

    /// Configuration is not valid JSON.
    #[error("configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a configuration file failed.
    #[error("failed to read {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Waiting for device readiness failed.
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;
