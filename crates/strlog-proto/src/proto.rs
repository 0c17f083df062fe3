use std::os::fd::RawFd;

use bytes::Bytes;

use crate::error::Result;

/// Result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    /// One complete record.
    Record(Bytes),
    /// Nothing available right now; wait for readiness and try again.
    Again,
}

/// A framing protocol layered over a [`LogTransport`](strlog_transport::LogTransport).
pub trait LogProto: Send {
    /// Called once by the reader before the first fetch.
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Fetch the next record.
    ///
    /// Returns `Err(ProtoError::Closed)` once the transport is exhausted.
    fn fetch(&mut self) -> Result<Fetch>;

    /// Descriptor to poll for readiness, if any.
    fn raw_fd(&self) -> Option<RawFd>;

    /// Protocol name for diagnostics.
    fn name(&self) -> &'static str;
}
