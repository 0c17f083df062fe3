use std::io::ErrorKind;
use std::os::fd::RawFd;

use bytes::BytesMut;
use strlog_transport::LogTransport;
use tracing::trace;

use crate::error::{ProtoError, Result};
use crate::options::ProtoOptions;
use crate::proto::{Fetch, LogProto};

/// Datagram framing: every transport read is one record.
///
/// Records longer than `max_msg_size` are cut by the transport; a zero-length
/// read means "nothing this time", never end of stream.
pub struct DgramProto<T> {
    inner: T,
    buf: BytesMut,
    options: ProtoOptions,
}

impl<T: LogTransport> DgramProto<T> {
    /// Create a datagram protocol over `inner`.
    pub fn new(inner: T, options: ProtoOptions) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(options.max_msg_size),
            options,
        }
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the protocol and return the transport.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current protocol options.
    pub fn options(&self) -> &ProtoOptions {
        &self.options
    }
}

impl<T: LogTransport> LogProto for DgramProto<T> {
    fn prepare(&mut self) -> Result<()> {
        self.options.validate()
    }

    fn fetch(&mut self) -> Result<Fetch> {
        loop {
            self.buf.resize(self.options.max_msg_size, 0);
            let read = match self.inner.read(&mut self.buf[..]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(Fetch::Again),
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Err(ProtoError::Closed)
                }
                Err(err) => return Err(ProtoError::Io(err)),
            };

            if read == 0 {
                trace!("empty datagram");
                return Ok(Fetch::Again);
            }

            return Ok(Fetch::Record(self.buf.split_to(read).freeze()));
        }
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.inner.raw_fd()
    }

    fn name(&self) -> &'static str {
        crate::factory::DGRAM
    }
}
