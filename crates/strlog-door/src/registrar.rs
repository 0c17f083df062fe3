use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{DoorError, Result};
use crate::traits::{Door, DoorBackend};

/// Mode of the marker file created at the door path (before umask).
pub const DOOR_FILE_MODE: u32 = 0o666;

/// Creates and attaches the door advertising a running collector.
#[derive(Clone)]
pub struct DoorRegistrar {
    backend: Arc<dyn DoorBackend>,
}

impl DoorRegistrar {
    pub fn new(backend: Arc<dyn DoorBackend>) -> Self {
        Self { backend }
    }

    /// The backend doors are created with.
    pub fn backend(&self) -> &Arc<dyn DoorBackend> {
        &self.backend
    }

    /// Register a door at `path`.
    ///
    /// Must only run after the process has finished forking: backends start
    /// service threads that a later fork would not carry over.
    pub fn register(&self, path: &Path) -> Result<Box<dyn Door>> {
        if std::fs::metadata(path).is_err() {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(DOOR_FILE_MODE)
                .open(path)
                .map_err(|source| DoorError::CreateFile {
                    path: path.to_path_buf(),
                    source,
                })?;
        }

        if let Err(err) = self.backend.detach(path) {
            debug!(?path, error = %err, "no stale door to detach");
        }

        let mut door = self.backend.create().map_err(|source| DoorError::Create {
            path: path.to_path_buf(),
            source,
        })?;

        door.attach(path).map_err(|source| DoorError::Attach {
            path: path.to_path_buf(),
            source,
        })?;

        info!(?path, backend = self.backend.name(), "syslog door attached");
        Ok(door)
    }

    /// Probe the door at `path`.
    pub fn probe(&self, path: &Path) -> Result<Vec<u8>> {
        self.backend.probe(path).map_err(|source| DoorError::Probe {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl std::fmt::Debug for DoorRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoorRegistrar")
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::os::fd::RawFd;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::socket::SocketDoorBackend;

    fn make_door_path(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/strlog-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("syslog_door")
    }

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        detached: AtomicUsize,
        closed: AtomicUsize,
    }

    struct StubDoor {
        fail_attach: bool,
        counters: Arc<Counters>,
    }

    impl Door for StubDoor {
        fn attach(&mut self, _path: &Path) -> io::Result<()> {
            if self.fail_attach {
                return Err(io::ErrorKind::PermissionDenied.into());
            }
            Ok(())
        }

        fn revoke(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn raw_fd(&self) -> Option<RawFd> {
            Some(99)
        }
    }

    impl Drop for StubDoor {
        fn drop(&mut self) {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct StubBackend {
        fail_create: bool,
        fail_attach: bool,
        counters: Arc<Counters>,
    }

    impl DoorBackend for StubBackend {
        fn create(&self) -> io::Result<Box<dyn Door>> {
            if self.fail_create {
                return Err(io::ErrorKind::OutOfMemory.into());
            }
            self.counters.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubDoor {
                fail_attach: self.fail_attach,
                counters: Arc::clone(&self.counters),
            }))
        }

        fn detach(&self, _path: &Path) -> io::Result<()> {
            self.counters.detached.fetch_add(1, Ordering::SeqCst);
            Err(io::ErrorKind::InvalidInput.into())
        }

        fn probe(&self, _path: &Path) -> io::Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    fn stub(fail_create: bool, fail_attach: bool) -> (DoorRegistrar, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let backend = StubBackend {
            fail_create,
            fail_attach,
            counters: Arc::clone(&counters),
        };
        (DoorRegistrar::new(Arc::new(backend)), counters)
    }

    #[test]
    fn creates_marker_file_then_attaches() {
        let path = make_door_path("reg-marker");
        let (registrar, counters) = stub(false, false);

        let door = registrar.register(&path).unwrap();
        assert!(path.is_file(), "marker file should exist");
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(counters.detached.load(Ordering::SeqCst), 1);
        assert_eq!(door.raw_fd(), Some(99));
        assert_eq!(format!("{door:?}"), "Door { fd: Some(99) }");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn marker_creation_failure_aborts() {
        let path = PathBuf::from(format!(
            "/tmp/strlog-missing-{}/nested/door",
            std::process::id()
        ));
        let (registrar, counters) = stub(false, false);

        let err = registrar.register(&path).unwrap_err();
        assert!(matches!(err, DoorError::CreateFile { .. }));
        assert_eq!(counters.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn create_failure_is_reported() {
        let path = make_door_path("reg-create");
        let (registrar, _counters) = stub(true, false);

        let err = registrar.register(&path).unwrap_err();
        assert!(matches!(err, DoorError::Create { .. }));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn attach_failure_closes_the_door() {
        let path = make_door_path("reg-attach");
        let (registrar, counters) = stub(false, true);

        let err = registrar.register(&path).unwrap_err();
        assert!(matches!(err, DoorError::Attach { .. }));
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn socket_backend_end_to_end() {
        let path = make_door_path("reg-socket");
        let registrar = DoorRegistrar::new(Arc::new(SocketDoorBackend));

        let mut door = registrar.register(&path).unwrap();
        assert!(registrar.probe(&path).unwrap().is_empty());

        door.revoke().unwrap();
        drop(door);
        assert!(matches!(
            registrar.probe(&path),
            Err(DoorError::Probe { .. })
        ));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn socket_backend_replaces_stale_door() {
        let path = make_door_path("reg-stale");
        let registrar = DoorRegistrar::new(Arc::new(SocketDoorBackend));

        let stale = std::os::unix::net::UnixListener::bind(&path).unwrap();
        drop(stale);

        let door = registrar.register(&path).unwrap();
        assert!(registrar.probe(&path).unwrap().is_empty());

        drop(door);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
