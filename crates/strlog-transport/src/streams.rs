use std::io::{self, Cursor, ErrorKind, Write};
use std::os::fd::RawFd;

use bytes::BytesMut;
use tracing::warn;

use crate::traits::{LogTransport, StreamsDevice};

/// Priority used when a message arrives without a `log_ctl` header
/// (`LOG_USER | LOG_NOTICE`).
pub const DEFAULT_PRIORITY: i32 = 13;

/// Default upper bound for the receive scratch area.
pub const DEFAULT_MAX_RECORD_SIZE: usize = 64 * 1024;

/// Translates STREAMS log messages into `<PRI>MESSAGE` records.
///
/// One `read` performs one `getmsg`. A message that does not fit the scratch
/// area is dropped with a warning and its remaining segments are discarded.
pub struct StreamsTransport<D> {
    device: D,
    scratch: BytesMut,
    max_record_size: usize,
    draining: bool,
    dropped: u64,
}

impl<D: StreamsDevice> StreamsTransport<D> {
    /// Wrap an open device. `max_record_size` bounds the scratch area.
    pub fn new(device: D, max_record_size: usize) -> Self {
        let max_record_size = max_record_size.max(1);
        Self {
            device,
            scratch: BytesMut::zeroed(max_record_size.min(DEFAULT_MAX_RECORD_SIZE)),
            max_record_size,
            draining: false,
            dropped: 0,
        }
    }

    /// Number of records dropped because they did not fit.
    pub fn dropped_records(&self) -> u64 {
        self.dropped
    }

    /// Borrow the underlying device.
    pub fn get_ref(&self) -> &D {
        &self.device
    }

    /// Consume the transport and return the device.
    pub fn into_inner(self) -> D {
        self.device
    }

    /// Discard continuation segments of a message that was already dropped.
    ///
    /// Returns once a segment without "more" flags was consumed, or when the
    /// device has nothing further to hand out right now.
    fn drain_continuation(&mut self) -> io::Result<()> {
        while self.draining {
            match self.device.get_msg(&mut self.scratch[..]) {
                Ok(msg) => {
                    if !msg.more.is_partial() {
                        self.draining = false;
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.draining = false;
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

impl<D: StreamsDevice> LogTransport for StreamsTransport<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.draining {
            self.drain_continuation()?;
            if self.draining {
                return Err(ErrorKind::WouldBlock.into());
            }
        }

        let capacity = buf.len().min(self.max_record_size);
        if self.scratch.len() < capacity {
            self.scratch.resize(capacity, 0);
        }

        let msg = self.device.get_msg(&mut self.scratch[..capacity])?;

        if msg.more.is_partial() {
            self.dropped += 1;
            self.draining = true;
            // A drop is reported once, including any failure to discard the rest.
            let drain_error = self.drain_continuation().err();
            warn!(
                res = format_args!("{:x}", msg.more.bits()),
                drain_error = ?drain_error,
                "insufficient buffer space for retrieving STREAMS log message"
            );
            return Ok(0);
        }

        let data_len = msg.data_len.min(capacity);
        let priority = msg.priority.unwrap_or(DEFAULT_PRIORITY);
        Ok(format_record(priority, &self.scratch[..data_len], buf))
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.device.raw_fd()
    }
}

/// Write `<priority>payload` into `out`, truncating silently at its end.
///
/// Returns the number of bytes written.
pub fn format_record(priority: i32, payload: &[u8], out: &mut [u8]) -> usize {
    let mut cursor = Cursor::new(out);
    // WriteZero only means the record was cut at capacity.
    let _ = write!(cursor, "<{priority}>").and_then(|()| cursor.write_all(payload));
    cursor.position() as usize
}
