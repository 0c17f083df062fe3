use std::fmt;
use std::io;
use std::os::fd::RawFd;
use std::path::Path;

/// A rendezvous object that answers every request with an empty reply.
///
/// Dropping a door closes its descriptor.
pub trait Door: Send {
    /// Make the door reachable at `path`.
    fn attach(&mut self, path: &Path) -> io::Result<()>;

    /// Reject all further requests. Revoking twice is a no-op.
    fn revoke(&mut self) -> io::Result<()>;

    /// Descriptor of the door, if it has one.
    fn raw_fd(&self) -> Option<RawFd>;
}

impl fmt::Debug for dyn Door {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Door").field("fd", &self.raw_fd()).finish()
    }
}

/// OS facility that creates, detaches and probes doors.
pub trait DoorBackend: Send + Sync {
    /// Create an unattached door with close-on-exec set.
    ///
    /// Backends may start service threads here or on attach, which is why
    /// doors must only be created after the process stopped forking.
    fn create(&self) -> io::Result<Box<dyn Door>>;

    /// Detach whatever door is attached at `path`.
    ///
    /// Fails when nothing is attached; callers treat that as a no-op.
    fn detach(&self, path: &Path) -> io::Result<()>;

    /// Send one empty request to the door at `path` and return the reply.
    fn probe(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}
