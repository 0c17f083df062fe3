//! Descriptor flag helpers shared by the device backends.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};

/// Set or clear `FD_CLOEXEC` on a descriptor.
pub fn set_cloexec(fd: BorrowedFd<'_>, enable: bool) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: `raw` comes from a borrowed descriptor that stays open for the call.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFD) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    let wanted = if enable {
        flags | libc::FD_CLOEXEC
    } else {
        flags & !libc::FD_CLOEXEC
    };
    if wanted != flags {
        // SAFETY: as above; F_SETFD only takes an integer argument.
        let rc = unsafe { libc::fcntl(raw, libc::F_SETFD, wanted) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Set or clear `O_NONBLOCK` on a descriptor.
pub fn set_nonblock(fd: BorrowedFd<'_>, enable: bool) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: `raw` comes from a borrowed descriptor that stays open for the call.
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    let wanted = if enable {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    if wanted != flags {
        // SAFETY: as above; F_SETFL only takes an integer argument.
        let rc = unsafe { libc::fcntl(raw, libc::F_SETFL, wanted) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
