use std::fmt;
use std::io;

use strlog_door::DoorError;
use strlog_proto::ProtoError;
use strlog_source::SourceError;
use strlog_transport::TransportError;

// Stable process exit codes; scripts match on these.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DEVICE_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const UNSUPPORTED: i32 = 69;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { ref source, .. } | TransportError::ConsoleLog { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::Unsupported => CliError::new(UNSUPPORTED, format!("{context}: {err}")),
        other => CliError::new(DEVICE_ERROR, format!("{context}: {other}")),
    }
}

pub fn proto_error(context: &str, err: ProtoError) -> CliError {
    match err {
        ProtoError::Io(source) => io_error(context, source),
        ProtoError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        ProtoError::InvalidOptions(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn door_error(context: &str, err: DoorError) -> CliError {
    match err {
        DoorError::Probe { source, .. } | DoorError::Io(source) => io_error(context, source),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

pub fn source_error(context: &str, err: SourceError) -> CliError {
    match err {
        SourceError::Transport(err) => transport_error(context, err),
        SourceError::Proto(err) => proto_error(context, err),
        SourceError::Io(source) => io_error(context, source),
        SourceError::ReadConfig { ref source, .. } => CliError::new(
            if source.kind() == io::ErrorKind::PermissionDenied {
                PERMISSION_DENIED
            } else {
                USAGE
            },
            format!("{context}: {err}"),
        ),
        SourceError::Config(_) | SourceError::Json(_) | SourceError::EmptyDevicePath => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SourceError::UnknownProtocol { .. } => {
            CliError::new(UNSUPPORTED, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
