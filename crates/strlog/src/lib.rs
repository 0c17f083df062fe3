//! Read the STREAMS kernel log device and advertise the reader through a door.
//!
//! strlog turns the two-part STREAMS log messages of illumos and Solaris into
//! `<PRI>MESSAGE` records and hands them to a reader. While it runs it can
//! attach a door to a well-known path so local programs can tell a collector
//! is active.
//!
//! # Crate Structure
//!
//! - [`transport`]: STREAMS device access and record formatting
//! - [`proto`]: Record framing and the protocol registry
//! - [`door`]: Door backends and registration
//! - [`source`]: The source driver, its reader and lifecycle hooks

/// Re-export transport types.
pub mod transport {
    pub use strlog_transport::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use strlog_proto::*;
}

/// Re-export door types.
pub mod door {
    pub use strlog_door::*;
}

/// Re-export source driver types.
pub mod source {
    pub use strlog_source::*;
}

pub use strlog_source::{streams_source_new, SourceDriver, STREAMS_SUPPORTED};
