use std::path::PathBuf;

/// Errors that can occur while opening or configuring a log device.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device node.
    #[error("failed to open log device {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The `I_STR`/`I_CONSLOG` ioctl was rejected by the device.
    #[error("failed to enable console log forwarding on {path}: {source}")]
    ConsoleLog {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the device descriptor.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// STREAMS log devices are not available on this platform.
    #[error("STREAMS log devices are not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, TransportError>;
