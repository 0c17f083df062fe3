//! illumos/Solaris STREAMS log device backend (`/dev/log`).

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::os::raw::{c_char, c_int, c_short};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::debug;

use crate::fd::{set_cloexec, set_nonblock};
use crate::traits::{MoreFlags, StreamsBackend, StreamsDevice, StreamsMessage};

/// `<sys/stropts.h>`: `I_STR = STR | 010`, `STR = 'S' << 8`.
const I_STR: c_int = ((b'S' as c_int) << 8) | 0o10;
/// `<sys/strlog.h>`: register as the console logger.
const I_CONSLOG: c_int = 3;

#[repr(C)]
struct StrBuf {
    maxlen: c_int,
    len: c_int,
    buf: *mut c_char,
}

#[repr(C)]
struct StrIoctl {
    ic_cmd: c_int,
    ic_timout: c_int,
    ic_len: c_int,
    ic_dp: *mut c_char,
}

/// `struct log_ctl` from `<sys/strlog.h>`.
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct LogCtl {
    mid: c_short,
    sid: c_short,
    level: c_char,
    flags: c_short,
    ltime: i32,
    ttime: i32,
    seq_no: c_int,
    pri: c_int,
}

extern "C" {
    fn getmsg(fd: c_int, ctlptr: *mut StrBuf, dataptr: *mut StrBuf, flagsp: *mut c_int) -> c_int;
}

/// Opens real STREAMS log devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysStreamsBackend;

impl StreamsBackend for SysStreamsBackend {
    fn open(&self, path: &Path) -> io::Result<Box<dyn StreamsDevice>> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)?;
        let fd = OwnedFd::from(file);
        set_cloexec(fd.as_fd(), true)?;
        debug!(?path, fd = fd.as_raw_fd(), "opened STREAMS log device");
        Ok(Box::new(SysStreamsDevice { fd }))
    }

    fn name(&self) -> &'static str {
        "streams"
    }
}

/// An open STREAMS log device descriptor.
#[derive(Debug)]
pub struct SysStreamsDevice {
    fd: OwnedFd,
}

impl StreamsDevice for SysStreamsDevice {
    fn enable_console_log(&mut self) -> io::Result<()> {
        let mut ioc = StrIoctl {
            ic_cmd: I_CONSLOG,
            ic_timout: 0,
            ic_len: 0,
            ic_dp: std::ptr::null_mut(),
        };
        // SAFETY: `ioc` is a valid `strioctl` for the duration of the call and
        // the descriptor is owned by `self`.
        let rc = unsafe {
            libc::ioctl(
                self.fd.as_raw_fd(),
                I_STR as _,
                &mut ioc as *mut StrIoctl,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn set_nonblocking(&mut self) -> io::Result<()> {
        set_nonblock(self.fd.as_fd(), true)
    }

    fn get_msg(&mut self, data: &mut [u8]) -> io::Result<StreamsMessage> {
        let mut lc = LogCtl::default();
        let ctl_size = std::mem::size_of::<LogCtl>() as c_int;
        let mut ctl = StrBuf {
            maxlen: ctl_size,
            len: ctl_size,
            buf: (&mut lc as *mut LogCtl).cast::<c_char>(),
        };
        let mut dat = StrBuf {
            maxlen: c_int::try_from(data.len()).unwrap_or(c_int::MAX),
            len: 0,
            buf: data.as_mut_ptr().cast::<c_char>(),
        };
        let mut flags: c_int = 0;

        // SAFETY: both strbufs point at writable buffers of the advertised
        // `maxlen`, which outlive the call.
        let res = unsafe { getmsg(self.fd.as_raw_fd(), &mut ctl, &mut dat, &mut flags) };
        if res == -1 {
            return Err(io::Error::last_os_error());
        }

        let priority = (ctl.len >= ctl_size).then_some(lc.pri);
        Ok(StreamsMessage {
            priority,
            data_len: usize::try_from(dat.len).unwrap_or(0),
            more: MoreFlags::from_bits(res),
        })
    }

    fn raw_fd(&self) -> Option<RawFd> {
        Some(self.fd.as_raw_fd())
    }
}
