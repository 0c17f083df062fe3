/// Errors that can occur while framing records.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// An I/O error occurred while reading from the transport.
    #[error("protocol I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport reported end of stream.
    #[error("transport closed")]
    Closed,

    /// No factory is registered for the requested protocol.
    #[error("no {role} protocol named {name:?} is registered")]
    UnknownProtocol { role: crate::ProtoRole, name: String },

    /// The protocol options cannot be used.
    #[error("invalid protocol options: {0}")]
    InvalidOptions(String),

    /// The protocol refused to start.
    #[error("protocol not ready: {0}")]
    NotReady(String),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
