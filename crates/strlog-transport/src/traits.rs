use std::io;
use std::os::fd::RawFd;
use std::path::Path;

/// `getmsg(2)` return bit: more control information is waiting.
pub const MORECTL: i32 = 1;
/// `getmsg(2)` return bit: more data is waiting.
pub const MOREDATA: i32 = 2;

/// The "more pending" flag word returned by a STREAMS receive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoreFlags(i32);

impl MoreFlags {
    /// The message was retrieved completely.
    pub const NONE: Self = Self(0);

    /// Keep only the `MORECTL`/`MOREDATA` bits of a raw `getmsg` result.
    pub fn from_bits(bits: i32) -> Self {
        Self(bits & (MORECTL | MOREDATA))
    }

    pub fn bits(self) -> i32 {
        self.0
    }

    pub fn more_ctl(self) -> bool {
        self.0 & MORECTL != 0
    }

    pub fn more_data(self) -> bool {
        self.0 & MOREDATA != 0
    }

    /// True when either part of the message did not fit.
    pub fn is_partial(self) -> bool {
        self.0 != 0
    }
}

/// Outcome of one dual-segment receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamsMessage {
    /// Priority from the `log_ctl` control header; `None` when the message
    /// carried no control part (continuation segments).
    pub priority: Option<i32>,
    /// Number of bytes written into the data segment.
    pub data_len: usize,
    /// Flags reporting whether anything was left behind.
    pub more: MoreFlags,
}

/// An open STREAMS log device.
///
/// Dropping the device closes its descriptor.
pub trait StreamsDevice: Send {
    /// Switch the stream into console-log forwarding mode (`I_STR` + `I_CONSLOG`).
    fn enable_console_log(&mut self) -> io::Result<()>;

    /// Put the descriptor into non-blocking mode.
    fn set_nonblocking(&mut self) -> io::Result<()>;

    /// Receive one control/data message pair; the data part goes into `data`.
    fn get_msg(&mut self, data: &mut [u8]) -> io::Result<StreamsMessage>;

    /// Descriptor used for readiness polling, if the device has one.
    fn raw_fd(&self) -> Option<RawFd>;
}

/// Opens STREAMS log devices.
pub trait StreamsBackend: Send + Sync {
    /// Open `path` read-only, without a controlling terminal, non-blocking,
    /// with close-on-exec set.
    fn open(&self, path: &Path) -> io::Result<Box<dyn StreamsDevice>>;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Raw record source driven by a protocol layer.
///
/// Each successful `read` yields at most one record. `Ok(0)` means no record
/// was produced by this attempt; it never signals end of stream.
pub trait LogTransport: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Descriptor used for readiness polling, if any.
    fn raw_fd(&self) -> Option<RawFd>;
}

impl<D: StreamsDevice + ?Sized> StreamsDevice for Box<D> {
    fn enable_console_log(&mut self) -> io::Result<()> {
        (**self).enable_console_log()
    }

    fn set_nonblocking(&mut self) -> io::Result<()> {
        (**self).set_nonblocking()
    }

    fn get_msg(&mut self, data: &mut [u8]) -> io::Result<StreamsMessage> {
        (**self).get_msg(data)
    }

    fn raw_fd(&self) -> Option<RawFd> {
        (**self).raw_fd()
    }
}

impl<T: LogTransport + ?Sized> LogTransport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn raw_fd(&self) -> Option<RawFd> {
        (**self).raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn more_flags_masks_unrelated_bits() {
        let flags = MoreFlags::from_bits(0x10 | MOREDATA);
        assert_eq!(flags.bits(), MOREDATA);
        assert!(flags.more_data());
        assert!(!flags.more_ctl());
        assert!(flags.is_partial());
    }

    #[test]
    fn complete_message_has_no_flags() {
        assert!(!MoreFlags::NONE.is_partial());
        assert!(!MoreFlags::from_bits(0).is_partial());
        assert!(MoreFlags::from_bits(MORECTL).more_ctl());
    }
}
