//! STREAMS log source driver.
//!
//! [`StreamsSourceDriver`] ties the layers together: it opens the kernel log
//! device through a [`StreamsBackend`](strlog_transport::StreamsBackend),
//! builds a datagram protocol looked up in the
//! [`ProtoRegistry`](strlog_proto::ProtoRegistry), hands it to a
//! [`LogReader`] and schedules door registration on the
//! [`HookPoint::PostDaemonized`] hook.
//!
//! ```no_run
//! use std::sync::Arc;
//! use strlog_source::{streams_source_new, GlobalConfig, HookPoint, LogMessage, LogPipe};
//!
//! let mut source = streams_source_new("/dev/log")?;
//! source.set_door_path("/etc/.syslog_door")?;
//! source.base_mut().append(Arc::new(|msg: LogMessage| {
//!     println!("{}", String::from_utf8_lossy(&msg.raw));
//! }));
//!
//! let cfg = GlobalConfig::new();
//! source.init(&cfg)?;
//! cfg.hooks.run(HookPoint::PostDaemonized);
//! # Ok::<(), strlog_source::SourceError>(())
//! ```

pub mod config;
pub mod driver;
pub mod dummy;
pub mod error;
pub mod hooks;
pub mod message;
pub mod pipe;
pub mod reader;

use std::path::PathBuf;

pub use config::{
    GlobalConfig, GlobalSettings, ParseFlags, ReaderOptions, SourceConfig, DEFAULT_DEVICE,
    DEFAULT_LOG_FETCH_LIMIT, DEFAULT_LOG_MSG_SIZE,
};
pub use driver::{DriverState, StreamsSourceDriver};
pub use dummy::DummySourceDriver;
pub use error::{Result, SourceError};
pub use hooks::{AppHooks, HookFn, HookPoint};
pub use message::{LogMessage, MessageSink, Priority, SourceKind};
pub use pipe::{LogPipe, SourceDriverBase};
pub use reader::LogReader;
pub use strlog_transport::STREAMS_SUPPORTED;

/// A STREAMS source: the real driver, or the stand-in where the platform
/// has no STREAMS log device.
#[derive(Debug)]
pub enum SourceDriver {
    Streams(StreamsSourceDriver),
    Dummy(DummySourceDriver),
}

impl SourceDriver {
    /// Set the door path; see [`StreamsSourceDriver::set_door_path`].
    pub fn set_door_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        match self {
            SourceDriver::Streams(driver) => driver.set_door_path(path),
            SourceDriver::Dummy(driver) => driver.set_door_path(path),
        }
    }

    pub fn base(&self) -> &SourceDriverBase {
        match self {
            SourceDriver::Streams(driver) => driver.base(),
            SourceDriver::Dummy(driver) => driver.base(),
        }
    }

    pub fn base_mut(&mut self) -> &mut SourceDriverBase {
        match self {
            SourceDriver::Streams(driver) => driver.base_mut(),
            SourceDriver::Dummy(driver) => driver.base_mut(),
        }
    }

    /// Reader options, when the driver has a reader to configure.
    pub fn reader_options_mut(&mut self) -> Option<&mut ReaderOptions> {
        match self {
            SourceDriver::Streams(driver) => Some(driver.reader_options_mut()),
            SourceDriver::Dummy(_) => None,
        }
    }

    /// The running reader, if any.
    pub fn reader_mut(&mut self) -> Option<&mut LogReader> {
        match self {
            SourceDriver::Streams(driver) => driver.reader_mut(),
            SourceDriver::Dummy(_) => None,
        }
    }

    pub fn is_streams(&self) -> bool {
        matches!(self, SourceDriver::Streams(_))
    }

    /// Apply a loaded configuration: id, door and reader settings.
    pub fn configure(&mut self, config: &SourceConfig) -> Result<()> {
        if let Some(id) = &config.id {
            self.base_mut().set_id(id.clone());
        }
        if let Some(door) = &config.door {
            self.set_door_path(door.clone())?;
        }
        if let Some(options) = self.reader_options_mut() {
            config.apply_reader_options(options);
        }
        Ok(())
    }
}

impl LogPipe for SourceDriver {
    fn init(&mut self, cfg: &GlobalConfig) -> Result<()> {
        match self {
            SourceDriver::Streams(driver) => driver.init(cfg),
            SourceDriver::Dummy(driver) => driver.init(cfg),
        }
    }

    fn deinit(&mut self) -> Result<()> {
        match self {
            SourceDriver::Streams(driver) => driver.deinit(),
            SourceDriver::Dummy(driver) => driver.deinit(),
        }
    }

    fn free(&mut self) {
        match self {
            SourceDriver::Streams(driver) => driver.free(),
            SourceDriver::Dummy(driver) => driver.free(),
        }
    }
}

/// Create a STREAMS source for `dev_filename` with default options.
///
/// Yields [`SourceDriver::Streams`] where [`STREAMS_SUPPORTED`] holds and
/// [`SourceDriver::Dummy`] everywhere else.
pub fn streams_source_new(dev_filename: impl Into<PathBuf>) -> Result<SourceDriver> {
    #[cfg(any(target_os = "solaris", target_os = "illumos"))]
    {
        StreamsSourceDriver::new(dev_filename).map(SourceDriver::Streams)
    }

    #[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
    {
        let dev_filename = dev_filename.into();
        if dev_filename.as_os_str().is_empty() {
            return Err(SourceError::EmptyDevicePath);
        }
        Ok(SourceDriver::Dummy(DummySourceDriver::new(dev_filename)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_matches_platform_support() {
        let source = streams_source_new("/dev/log").unwrap();
        assert_eq!(source.is_streams(), STREAMS_SUPPORTED);
    }

    #[test]
    fn factory_rejects_empty_path() {
        assert!(matches!(
            streams_source_new(""),
            Err(SourceError::EmptyDevicePath)
        ));
    }

    #[test]
    fn configure_applies_id_and_door() {
        let config = SourceConfig::from_json_str(
            r#"{"id": "s_sun", "door": "/tmp/strlog-door", "reader": {"msg_size": 1024}}"#,
        )
        .unwrap();
        let mut source = streams_source_new("/dev/log").unwrap();
        source.configure(&config).unwrap();
        assert_eq!(source.base().id(), "s_sun");

        if let SourceDriver::Streams(driver) = &source {
            assert_eq!(driver.reader_options().msg_size, 1024);
            assert_eq!(
                driver.door_path(),
                Some(std::path::Path::new("/tmp/strlog-door"))
            );
        }
    }

    #[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
    #[test]
    fn stand_in_lifecycle_is_inert() {
        let mut source = streams_source_new("/dev/log").unwrap();
        source.set_door_path("/tmp/strlog-door").unwrap();
        let cfg = GlobalConfig::new();

        source.init(&cfg).unwrap();
        assert!(source.reader_mut().is_none());
        cfg.hooks.run(HookPoint::PostDaemonized);
        source.deinit().unwrap();
        source.free();
    }
}
