//! illumos/Solaris doors.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::traits::{Door, DoorBackend};

type DoorServerProc = extern "C" fn(
    cookie: *mut c_void,
    argp: *mut c_char,
    arg_size: libc::size_t,
    dp: *mut c_void,
    n_desc: c_uint,
);

/// `door_arg_t` from `<door.h>`.
#[repr(C)]
struct DoorArg {
    data_ptr: *mut c_char,
    data_size: libc::size_t,
    desc_ptr: *mut c_void,
    desc_num: c_uint,
    rbuf: *mut c_char,
    rsize: libc::size_t,
}

extern "C" {
    fn door_create(server_procedure: DoorServerProc, cookie: *mut c_void, attributes: c_uint)
        -> c_int;
    fn door_return(
        data_ptr: *mut c_char,
        data_size: libc::size_t,
        desc_ptr: *mut c_void,
        num_desc: c_uint,
    ) -> c_int;
    fn door_revoke(d: c_int) -> c_int;
    fn door_call(d: c_int, params: *mut DoorArg) -> c_int;
    fn fattach(fildes: c_int, path: *const c_char) -> c_int;
    fn fdetach(path: *const c_char) -> c_int;
}

extern "C" fn empty_reply(
    _cookie: *mut c_void,
    _argp: *mut c_char,
    _arg_size: libc::size_t,
    _dp: *mut c_void,
    _n_desc: c_uint,
) {
    // SAFETY: called on a door server thread; an empty reply carries no pointers.
    unsafe {
        door_return(std::ptr::null_mut(), 0, std::ptr::null_mut(), 0);
    }
}

fn c_path(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "door path contains NUL"))
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    // SAFETY: `fd` is a freshly created door descriptor owned by the caller.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Native doors via `door_create(3C)` and `fattach(3C)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysDoorBackend;

impl DoorBackend for SysDoorBackend {
    fn create(&self) -> io::Result<Box<dyn Door>> {
        // SAFETY: `empty_reply` matches the server procedure ABI and needs no cookie.
        let raw = unsafe { door_create(empty_reply, std::ptr::null_mut(), 0) };
        if raw == -1 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `door_create` returned a new descriptor we now own.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        set_cloexec(fd.as_raw_fd())?;
        Ok(Box::new(SysDoor {
            fd: Some(fd),
            attached: None,
        }))
    }

    fn detach(&self, path: &Path) -> io::Result<()> {
        let cpath = c_path(path)?;
        // SAFETY: `cpath` is a valid NUL-terminated path.
        if unsafe { fdetach(cpath.as_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn probe(&self, path: &Path) -> io::Result<Vec<u8>> {
        let file = OpenOptions::new().read(true).open(path)?;
        let mut rbuf = [0u8; 64];
        let mut arg = DoorArg {
            data_ptr: std::ptr::null_mut(),
            data_size: 0,
            desc_ptr: std::ptr::null_mut(),
            desc_num: 0,
            rbuf: rbuf.as_mut_ptr().cast::<c_char>(),
            rsize: rbuf.len(),
        };

        // SAFETY: `arg` points at a valid, writable result buffer of `rsize` bytes.
        if unsafe { door_call(file.as_raw_fd(), &mut arg) } == -1 {
            return Err(io::Error::last_os_error());
        }

        let reply = if arg.data_size == 0 || arg.data_ptr.is_null() {
            Vec::new()
        } else {
            // SAFETY: the kernel reports `data_size` readable bytes at `data_ptr`.
            unsafe { std::slice::from_raw_parts(arg.data_ptr.cast::<u8>(), arg.data_size) }
                .to_vec()
        };

        if arg.rbuf != rbuf.as_mut_ptr().cast::<c_char>() {
            // SAFETY: a result that did not fit was mapped by the kernel for us.
            unsafe { libc::munmap(arg.rbuf.cast::<c_void>(), arg.rsize) };
        }
        Ok(reply)
    }

    fn name(&self) -> &'static str {
        "doors"
    }
}

/// A native door descriptor.
///
/// `door_revoke(3C)` closes the descriptor, so a revoked door gives up
/// ownership and dropping it closes nothing.
pub struct SysDoor {
    fd: Option<OwnedFd>,
    attached: Option<PathBuf>,
}

impl SysDoor {
    fn live_fd(&self) -> io::Result<RawFd> {
        self.fd
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }
}

impl Door for SysDoor {
    fn attach(&mut self, path: &Path) -> io::Result<()> {
        let fd = self.live_fd()?;
        let cpath = c_path(path)?;
        // SAFETY: the descriptor is a live door and `cpath` is NUL-terminated.
        if unsafe { fattach(fd, cpath.as_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        debug!(?path, fd, "door attached");
        self.attached = Some(path.to_path_buf());
        Ok(())
    }

    fn revoke(&mut self) -> io::Result<()> {
        let Some(fd) = self.fd.as_ref().map(AsRawFd::as_raw_fd) else {
            return Ok(());
        };
        // SAFETY: the descriptor is owned by `self` and still open.
        if unsafe { door_revoke(fd) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // The descriptor is closed now; release it without a second close.
        if let Some(owned) = self.fd.take() {
            let _ = owned.into_raw_fd();
        }
        debug!(path = ?self.attached, "door revoked");
        Ok(())
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.fd.as_ref().map(AsRawFd::as_raw_fd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoke_gives_up_the_descriptor() {
        let mut door = SysDoorBackend.create().unwrap();
        assert!(door.raw_fd().is_some());

        door.revoke().unwrap();
        assert_eq!(door.raw_fd(), None);
        door.revoke().unwrap();
        drop(door);
    }

    #[test]
    fn attach_after_revoke_fails() {
        let mut door = SysDoorBackend.create().unwrap();
        door.revoke().unwrap();
        let err = door.attach(Path::new("/tmp/strlog-revoked-door")).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}
