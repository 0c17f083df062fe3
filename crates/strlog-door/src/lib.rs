//! Filesystem rendezvous objects ("doors") for strlog.
//!
//! A door is a liveness marker: local processes probe the door path to see
//! whether a collector is reading the STREAMS log device. The door carries no
//! data and answers every request with an empty reply.
//!
//! On illumos and Solaris native doors are used. Other unix systems get a
//! Unix domain socket stand-in with the same observable behavior.

pub mod error;
pub mod registrar;
pub mod traits;

#[cfg(unix)]
pub mod socket;

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub mod sys;

use std::sync::Arc;

pub use error::{DoorError, Result};
pub use registrar::{DoorRegistrar, DOOR_FILE_MODE};
pub use traits::{Door, DoorBackend};

#[cfg(unix)]
pub use socket::SocketDoorBackend;

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub use sys::SysDoorBackend;

/// The door backend native to this platform.
pub fn default_backend() -> Arc<dyn DoorBackend> {
    #[cfg(any(target_os = "solaris", target_os = "illumos"))]
    {
        Arc::new(SysDoorBackend)
    }

    #[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
    {
        Arc::new(SocketDoorBackend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_has_a_name() {
        let backend = default_backend();
        assert!(!backend.name().is_empty());
    }
}
