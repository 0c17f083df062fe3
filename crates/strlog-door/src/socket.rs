use std::io::{self, ErrorKind, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::traits::{Door, DoorBackend};

const POLL_INTERVAL_MS: libc::c_int = 50;
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Doors emulated with Unix domain sockets.
///
/// The socket replaces the empty marker file at the door path; every
/// connection is accepted and closed without a byte written.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketDoorBackend;

impl SocketDoorBackend {
    /// Default permission mode for attached sockets; anyone may probe.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o666;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;
}

impl DoorBackend for SocketDoorBackend {
    fn create(&self) -> io::Result<Box<dyn Door>> {
        Ok(Box::new(SocketDoor::default()))
    }

    fn detach(&self, path: &Path) -> io::Result<()> {
        let metadata = std::fs::symlink_metadata(path)?;
        if !metadata.file_type().is_socket() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "no door attached at path",
            ));
        }
        debug!(?path, "removing stale door socket");
        std::fs::remove_file(path)
    }

    fn probe(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut stream = UnixStream::connect(path)?;
        stream.set_read_timeout(Some(PROBE_TIMEOUT))?;
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply)?;
        Ok(reply)
    }

    fn name(&self) -> &'static str {
        "unix-socket"
    }
}

struct Attached {
    path: PathBuf,
    created_inode: (u64, u64),
    fd: RawFd,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

/// A socket-backed door.
#[derive(Default)]
pub struct SocketDoor {
    attached: Option<Attached>,
    revoked: bool,
}

impl Door for SocketDoor {
    fn attach(&mut self, path: &Path) -> io::Result<()> {
        if self.revoked {
            return Err(io::Error::other("door already revoked"));
        }
        if self.attached.is_some() {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                "door already attached",
            ));
        }

        let path_bytes = path.as_os_str().len();
        if path_bytes >= SocketDoorBackend::MAX_PATH_LEN {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "door path too long ({path_bytes} bytes, max {})",
                    SocketDoorBackend::MAX_PATH_LEN
                ),
            ));
        }

        // The registrar leaves an empty marker file behind; a socket cannot be
        // bound over it, so it is replaced. Anything else is left alone.
        match std::fs::symlink_metadata(path) {
            Ok(metadata) => {
                let file_type = metadata.file_type();
                if file_type.is_socket() || (file_type.is_file() && metadata.len() == 0) {
                    std::fs::remove_file(path)?;
                } else {
                    return Err(io::Error::new(
                        ErrorKind::AlreadyExists,
                        "existing path is not a door marker",
                    ));
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        let listener = UnixListener::bind(path)?;
        listener.set_nonblocking(true)?;
        std::fs::set_permissions(
            path,
            std::fs::Permissions::from_mode(SocketDoorBackend::DEFAULT_SOCKET_MODE),
        )?;
        let metadata = std::fs::symlink_metadata(path)?;

        let fd = listener.as_raw_fd();
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("strlog-door".to_string())
                .spawn(move || serve(listener, stop))?
        };

        debug!(?path, fd, "door socket attached");
        self.attached = Some(Attached {
            path: path.to_path_buf(),
            created_inode: (metadata.dev(), metadata.ino()),
            fd,
            stop,
            worker: Some(worker),
        });
        Ok(())
    }

    fn revoke(&mut self) -> io::Result<()> {
        self.revoked = true;
        let Some(mut attached) = self.attached.take() else {
            return Ok(());
        };

        attached.stop.store(true, Ordering::Release);
        if let Some(worker) = attached.worker.take() {
            if worker.join().is_err() {
                warn!(path = ?attached.path, "door service thread panicked");
            }
        }

        // Only remove the path if it is still the socket this door created.
        if let Ok(metadata) = std::fs::symlink_metadata(&attached.path) {
            if metadata.file_type().is_socket()
                && (metadata.dev(), metadata.ino()) == attached.created_inode
            {
                debug!(path = ?attached.path, "removing door socket");
                std::fs::remove_file(&attached.path)?;
            } else {
                debug!(
                    path = ?attached.path,
                    "door path identity changed; skipping cleanup"
                );
            }
        }
        Ok(())
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.attached.as_ref().map(|attached| attached.fd)
    }
}

impl Drop for SocketDoor {
    fn drop(&mut self) {
        if self.attached.is_some() {
            if let Err(err) = self.revoke() {
                debug!(error = %err, "revoking door on drop failed");
            }
        }
    }
}

fn serve(listener: UnixListener, stop: Arc<AtomicBool>) {
    let mut pfd = libc::pollfd {
        fd: listener.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };

    while !stop.load(Ordering::Acquire) {
        // SAFETY: `pfd` is a single valid pollfd for a descriptor owned by `listener`.
        let rc = unsafe { libc::poll(&mut pfd, 1, POLL_INTERVAL_MS) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != ErrorKind::Interrupted {
                debug!(error = %err, "door poll failed");
                std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS as u64));
            }
            continue;
        }
        if rc == 0 {
            continue;
        }

        loop {
            match listener.accept() {
                // Closing without writing is the empty reply.
                Ok((stream, _addr)) => {
                    trace!("answered door probe");
                    drop(stream);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(error = %err, "door accept failed");
                    break;
                }
            }
        }
    }
}
