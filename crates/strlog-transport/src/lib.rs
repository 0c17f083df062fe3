//! STREAMS log device access.
//!
//! This is the lowest layer of strlog. It opens the kernel log device,
//! performs the two-part `getmsg` receive and turns every complete message
//! into a `<PRI>MESSAGE` record through [`StreamsTransport`].
//!
//! The real device backend only exists on illumos and Solaris; everything
//! else is platform independent and driven through [`StreamsBackend`].

pub mod error;
#[cfg(unix)]
pub mod fd;
pub mod streams;
pub mod traits;

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub mod sys;

pub use error::{Result, TransportError};
pub use streams::{format_record, StreamsTransport, DEFAULT_MAX_RECORD_SIZE, DEFAULT_PRIORITY};
pub use traits::{
    LogTransport, MoreFlags, StreamsBackend, StreamsDevice, StreamsMessage, MORECTL, MOREDATA,
};

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub use sys::{SysStreamsBackend, SysStreamsDevice};

/// Whether this build can talk to a real STREAMS log device.
pub const STREAMS_SUPPORTED: bool = cfg!(any(target_os = "solaris", target_os = "illumos"));
