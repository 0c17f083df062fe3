use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strlog_door::{Door, DoorBackend, DoorRegistrar};
use strlog_proto::{ProtoFactory, ProtoOptions, ProtoRole, DGRAM};
use strlog_transport::{LogTransport, StreamsBackend, StreamsTransport, TransportError};
use tracing::{debug, error, info, warn};

use crate::config::{GlobalConfig, ParseFlags, ReaderOptions};
use crate::error::{Result, SourceError};
use crate::hooks::{AppHooks, HookPoint};
use crate::message::SourceKind;
use crate::pipe::{LogPipe, SourceDriverBase};
use crate::reader::LogReader;

/// Lifecycle state of a [`StreamsSourceDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Initializing,
    Running,
    Deinitialized,
    Freed,
}

/// The door of one driver, shared with its pending registration hook.
///
/// A retired slot belongs to a driver that was torn down or failed to start;
/// a registration that fires afterwards does nothing.
#[derive(Default)]
struct DoorSlot {
    door: Option<Box<dyn Door>>,
    retired: bool,
}

type SharedDoor = Arc<Mutex<DoorSlot>>;

fn lock(slot: &SharedDoor) -> MutexGuard<'_, DoorSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn retire(slot: &SharedDoor) {
    let mut slot = lock(slot);
    slot.retired = true;
    if let Some(mut door) = slot.door.take() {
        match door.revoke() {
            Ok(()) => debug!("syslog door revoked"),
            Err(err) => warn!(error = %err, "error revoking syslog door"),
        }
    }
}

fn register_door(registrar: &DoorRegistrar, path: &Path, slot: &SharedDoor) {
    let mut slot = lock(slot);
    if slot.retired {
        debug!(?path, "source driver gone; skipping syslog door registration");
        return;
    }
    match registrar.register(path) {
        Ok(door) => slot.door = Some(door),
        Err(err) => error!(?path, error = %err, "syslog door registration failed"),
    }
}

/// Source driver reading the STREAMS kernel log device.
///
/// The device is opened on `init`, wrapped in a [`StreamsTransport`] and a
/// datagram protocol, and handed to a [`LogReader`]. When a door path is set
/// the door is registered once the process has daemonized.
pub struct StreamsSourceDriver {
    base: SourceDriverBase,
    dev_filename: Option<PathBuf>,
    door_filename: Option<PathBuf>,
    door: SharedDoor,
    reader: Option<LogReader>,
    reader_options: ReaderOptions,
    proto_options: ProtoOptions,
    proto_factory: Option<Arc<dyn ProtoFactory>>,
    devices: Arc<dyn StreamsBackend>,
    doors: DoorRegistrar,
    state: DriverState,
}

impl StreamsSourceDriver {
    /// Driver over the native device and door backends.
    #[cfg(any(target_os = "solaris", target_os = "illumos"))]
    pub fn new(dev_filename: impl Into<PathBuf>) -> Result<Self> {
        Self::with_backends(
            dev_filename,
            Arc::new(strlog_transport::SysStreamsBackend),
            strlog_door::default_backend(),
        )
    }

    /// Driver over injected backends.
    pub fn with_backends(
        dev_filename: impl Into<PathBuf>,
        devices: Arc<dyn StreamsBackend>,
        doors: Arc<dyn DoorBackend>,
    ) -> Result<Self> {
        let dev_filename = dev_filename.into();
        if dev_filename.as_os_str().is_empty() {
            return Err(SourceError::EmptyDevicePath);
        }

        // Kernel messages are local and never carry a hostname.
        let mut reader_options = ReaderOptions::defaults();
        reader_options.parse_flags.insert(ParseFlags::LOCAL);
        reader_options.parse_flags.remove(ParseFlags::EXPECT_HOSTNAME);

        Ok(Self {
            base: SourceDriverBase::new(),
            dev_filename: Some(dev_filename),
            door_filename: None,
            door: SharedDoor::default(),
            reader: None,
            reader_options,
            proto_options: ProtoOptions::default(),
            proto_factory: None,
            devices,
            doors: DoorRegistrar::new(doors),
            state: DriverState::Uninitialized,
        })
    }

    /// Set the door path. Only valid before `init`; an empty path disables
    /// the door.
    pub fn set_door_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        if self.state != DriverState::Uninitialized {
            return Err(SourceError::AlreadyInitialized);
        }
        let path = path.into();
        self.door_filename = (!path.as_os_str().is_empty()).then_some(path);
        Ok(())
    }

    /// Bind a protocol factory instead of looking one up on `init`.
    pub fn set_proto_factory(&mut self, factory: Arc<dyn ProtoFactory>) {
        self.proto_factory = Some(factory);
    }

    pub fn device_path(&self) -> Option<&Path> {
        self.dev_filename.as_deref()
    }

    pub fn door_path(&self) -> Option<&Path> {
        self.door_filename.as_deref()
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn base(&self) -> &SourceDriverBase {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut SourceDriverBase {
        &mut self.base
    }

    pub fn reader_options(&self) -> &ReaderOptions {
        &self.reader_options
    }

    pub fn reader_options_mut(&mut self) -> &mut ReaderOptions {
        &mut self.reader_options
    }

    pub fn proto_options(&self) -> &ProtoOptions {
        &self.proto_options
    }

    /// The attached reader; present only while running.
    pub fn reader(&self) -> Option<&LogReader> {
        self.reader.as_ref()
    }

    pub fn reader_mut(&mut self) -> Option<&mut LogReader> {
        self.reader.as_mut()
    }

    /// Whether a door is currently attached for this driver.
    pub fn door_attached(&self) -> bool {
        lock(&self.door).door.is_some()
    }

    fn schedule_door(&self, hooks: &AppHooks, path: PathBuf) {
        let registrar = self.doors.clone();
        let slot = Arc::clone(&self.door);
        debug!(?path, "syslog door registration scheduled");
        hooks.register(
            HookPoint::PostDaemonized,
            Box::new(move |_| register_door(&registrar, &path, &slot)),
        );
    }

    /// Retire the current door slot and start over with a fresh one.
    fn abandon_door(&mut self) {
        let old = std::mem::take(&mut self.door);
        retire(&old);
    }

    fn start(&mut self, cfg: &GlobalConfig, dev_filename: &Path) -> Result<()> {
        self.base.init_method(cfg)?;
        self.reader_options.init(cfg);

        let mut device = self.devices.open(dev_filename).map_err(|source| {
            error!(file = ?dev_filename, error = %source, "error opening syslog device");
            TransportError::Open {
                path: dev_filename.to_path_buf(),
                source,
            }
        })?;

        if let Err(source) = device.enable_console_log() {
            error!(
                file = ?dev_filename,
                error = %source,
                "error in ioctl(I_STR, I_CONSLOG)"
            );
            return Err(TransportError::ConsoleLog {
                path: dev_filename.to_path_buf(),
                source,
            }
            .into());
        }

        if let Err(err) = device.set_nonblocking() {
            warn!(file = ?dev_filename, error = %err, "failed to set syslog device non-blocking");
        }

        self.proto_options.max_msg_size = self.reader_options.msg_size;

        let factory = match &self.proto_factory {
            Some(factory) => Arc::clone(factory),
            None => {
                let factory = cfg
                    .protocols
                    .lookup(ProtoRole::Server, DGRAM)
                    .ok_or_else(|| {
                        error!(proto = DGRAM, "unknown server protocol plugin");
                        SourceError::UnknownProtocol {
                            name: DGRAM.to_string(),
                        }
                    })?;
                self.proto_factory = Some(Arc::clone(&factory));
                factory
            }
        };

        let transport: Box<dyn LogTransport> =
            Box::new(StreamsTransport::new(device, self.reader_options.msg_size));
        let proto = factory
            .create(transport, &self.proto_options)
            .inspect_err(|err| {
                error!(file = ?dev_filename, error = %err, "error constructing log protocol");
            })?;

        let label = dev_filename.display().to_string();
        let mut reader = LogReader::new(proto);
        reader.set_options(
            &self.reader_options,
            1,
            SourceKind::SunStreams,
            self.base.id(),
            &label,
        );
        if let Some(next) = self.base.next() {
            reader.append(Arc::clone(next));
        }

        if let Some(door) = self.door_filename.clone() {
            self.schedule_door(&cfg.hooks, door);
        }

        if let Err(err) = reader.init(cfg) {
            error!(file = ?dev_filename, error = %err, "error initializing log_reader, closing fd");
            self.abandon_door();
            return Err(err);
        }

        info!(
            id = self.base.id(),
            file = ?dev_filename,
            door = ?self.door_filename,
            "STREAMS log source started"
        );
        self.reader = Some(reader);
        Ok(())
    }
}

impl LogPipe for StreamsSourceDriver {
    fn init(&mut self, cfg: &GlobalConfig) -> Result<()> {
        if self.state != DriverState::Uninitialized {
            return Err(SourceError::AlreadyInitialized);
        }
        let Some(dev_filename) = self.dev_filename.clone() else {
            return Err(SourceError::EmptyDevicePath);
        };

        self.state = DriverState::Initializing;
        match self.start(cfg, &dev_filename) {
            Ok(()) => {
                self.state = DriverState::Running;
                Ok(())
            }
            Err(err) => {
                self.state = DriverState::Uninitialized;
                Err(err)
            }
        }
    }

    fn deinit(&mut self) -> Result<()> {
        if let Some(mut reader) = self.reader.take() {
            if let Err(err) = reader.deinit() {
                warn!(error = %err, "error deinitializing log reader");
            }
        }

        retire(&self.door);

        self.base.deinit_method()?;
        if self.state == DriverState::Running {
            self.state = DriverState::Deinitialized;
            debug!(file = ?self.dev_filename, "STREAMS log source stopped");
        }
        Ok(())
    }

    fn free(&mut self) {
        self.reader_options.destroy();
        self.dev_filename = None;
        self.door_filename = None;
        if let Some(mut reader) = self.reader.take() {
            reader.free();
        }
        retire(&self.door);
        self.proto_factory = None;
        self.base.free_method();
        self.state = DriverState::Freed;
    }
}

impl fmt::Debug for StreamsSourceDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamsSourceDriver")
            .field("base", &self.base)
            .field("dev_filename", &self.dev_filename)
            .field("door_filename", &self.door_filename)
            .field("door_attached", &self.door_attached())
            .field("reader", &self.reader.is_some())
            .field("state", &self.state)
            .field("devices", &self.devices.name())
            .field("doors", &self.doors)
            .finish()
    }
}
