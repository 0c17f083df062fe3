//! Record framing for strlog.
//!
//! A protocol sits between a [`LogTransport`](strlog_transport::LogTransport)
//! and the reader: the transport performs raw I/O, the protocol decides where
//! one record ends. Protocols are built by [`ProtoFactory`] implementations
//! looked up by role and name in a [`ProtoRegistry`].

pub mod dgram;
pub mod error;
pub mod factory;
pub mod options;
pub mod proto;

pub use dgram::DgramProto;
pub use error::{ProtoError, Result};
pub use factory::{DgramProtoFactory, ProtoFactory, ProtoRegistry, ProtoRole, DGRAM};
pub use options::{ProtoOptions, DEFAULT_MAX_MSG_SIZE};
pub use proto::{Fetch, LogProto};
