use std::path::PathBuf;

/// Errors that can occur while registering a rendezvous door.
#[derive(Debug, thiserror::Error)]
pub enum DoorError {
    /// The marker file at the door path could not be created.
    #[error("error creating syslog door file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The door object itself could not be created.
    #[error("error creating syslog door {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The door could not be attached to the filesystem path.
    #[error("error attaching syslog door {path}: {source}")]
    Attach {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Probing a door failed.
    #[error("error probing syslog door {path}: {source}")]
    Probe {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Another I/O error.
    #[error("door I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DoorError>;
