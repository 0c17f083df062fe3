use std::fmt;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use strlog_proto::ProtoRegistry;

use crate::error::{Result, SourceError};
use crate::hooks::AppHooks;

/// Default maximum message size when neither the source nor the global
/// configuration sets one.
pub const DEFAULT_LOG_MSG_SIZE: usize = 65536;

/// Default number of records fetched per readiness event.
pub const DEFAULT_LOG_FETCH_LIMIT: usize = 10;

/// Default device path.
pub const DEFAULT_DEVICE: &str = "/dev/log";

/// Process-wide limits, loadable from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub log_msg_size: usize,
    pub log_fetch_limit: usize,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_msg_size: DEFAULT_LOG_MSG_SIZE,
            log_fetch_limit: DEFAULT_LOG_FETCH_LIMIT,
        }
    }
}

/// The active global configuration handed to every pipe on `init`.
#[derive(Clone)]
pub struct GlobalConfig {
    pub settings: GlobalSettings,
    pub hooks: Arc<AppHooks>,
    pub protocols: Arc<ProtoRegistry>,
}

impl GlobalConfig {
    /// Built-in limits, a fresh hook registry and the default protocols.
    pub fn new() -> Self {
        Self {
            settings: GlobalSettings::default(),
            hooks: Arc::new(AppHooks::new()),
            protocols: Arc::new(ProtoRegistry::with_defaults()),
        }
    }

    /// Replace the limits, keeping the injected handles.
    pub fn with_settings(mut self, settings: GlobalSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the hook registry.
    pub fn with_hooks(mut self, hooks: Arc<AppHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replace the protocol registry.
    pub fn with_protocols(mut self, protocols: Arc<ProtoRegistry>) -> Self {
        self.protocols = protocols;
        self
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("settings", &self.settings)
            .field("hooks", &self.hooks)
            .field("protocols", &self.protocols)
            .finish()
    }
}

/// Parsing policy bits applied to records by downstream parsers.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ParseFlags(u32);

impl ParseFlags {
    pub const NONE: Self = Self(0);
    /// Records are not parsed; the whole line becomes the message.
    pub const NO_PARSE: Self = Self(0x0001);
    /// Records are expected to carry a hostname field.
    pub const EXPECT_HOSTNAME: Self = Self(0x0002);
    /// Records originate on this host.
    pub const LOCAL: Self = Self(0x0004);
    /// Payloads are assumed to be valid UTF-8.
    pub const ASSUME_UTF8: Self = Self(0x0008);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for ParseFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for ParseFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::NO_PARSE, "NO_PARSE"),
            (Self::EXPECT_HOSTNAME, "EXPECT_HOSTNAME"),
            (Self::LOCAL, "LOCAL"),
            (Self::ASSUME_UTF8, "ASSUME_UTF8"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "ParseFlags({})", set.join(" | "))
    }
}

/// Buffering and parsing options of a reader.
///
/// `msg_size` and `fetch_limit` of zero inherit from [`GlobalSettings`] when
/// the options are finalized with [`ReaderOptions::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub msg_size: usize,
    pub fetch_limit: usize,
    pub parse_flags: ParseFlags,
    #[serde(skip)]
    initialized: bool,
}

impl ReaderOptions {
    /// Options as a freshly constructed source sets them.
    pub fn defaults() -> Self {
        Self {
            parse_flags: ParseFlags::EXPECT_HOSTNAME,
            ..Self::default()
        }
    }

    /// Finalize against the global configuration.
    pub fn init(&mut self, cfg: &GlobalConfig) {
        if self.msg_size == 0 {
            self.msg_size = cfg.settings.log_msg_size;
        }
        if self.fetch_limit == 0 {
            self.fetch_limit = cfg.settings.log_fetch_limit;
        }
        self.initialized = true;
    }

    /// Release the options; they read as unset afterwards.
    pub fn destroy(&mut self) {
        *self = Self::default();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// A STREAMS source as described by a JSON document.
///
/// ```json
/// { "device": "/dev/log", "door": "/etc/.syslog_door",
///   "reader": { "msg_size": 8192 }, "global": { "log_fetch_limit": 20 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub device: PathBuf,
    pub door: Option<PathBuf>,
    pub id: Option<String>,
    pub reader: ReaderOptions,
    pub global: GlobalSettings,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            door: None,
            id: None,
            reader: ReaderOptions::default(),
            global: GlobalSettings::default(),
        }
    }
}

impl SourceConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| SourceError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.as_os_str().is_empty() {
            return Err(SourceError::EmptyDevicePath);
        }
        if matches!(&self.door, Some(door) if door.as_os_str().is_empty()) {
            return Err(SourceError::Config("door path must not be empty".into()));
        }
        if self.global.log_msg_size == 0 {
            return Err(SourceError::Config(
                "global log_msg_size must be greater than zero".into(),
            ));
        }
        if self.global.log_fetch_limit == 0 {
            return Err(SourceError::Config(
                "global log_fetch_limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Merge the reader settings into options a driver already holds.
    ///
    /// Sizes replace the driver's values when set; parse flags are added.
    pub fn apply_reader_options(&self, options: &mut ReaderOptions) {
        if self.reader.msg_size != 0 {
            options.msg_size = self.reader.msg_size;
        }
        if self.reader.fetch_limit != 0 {
            options.fetch_limit = self.reader.fetch_limit;
        }
        options.parse_flags.insert(self.reader.parse_flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_options_inherit_global_limits() {
        let cfg = GlobalConfig::new().with_settings(GlobalSettings {
            log_msg_size: 4096,
            log_fetch_limit: 3,
        });

        let mut options = ReaderOptions::defaults();
        assert!(!options.is_initialized());
        options.init(&cfg);
        assert!(options.is_initialized());
        assert_eq!(options.msg_size, 4096);
        assert_eq!(options.fetch_limit, 3);

        let mut explicit = ReaderOptions {
            msg_size: 128,
            ..ReaderOptions::defaults()
        };
        explicit.init(&cfg);
        assert_eq!(explicit.msg_size, 128);
    }

    #[test]
    fn destroy_resets_options() {
        let mut options = ReaderOptions::defaults();
        options.init(&GlobalConfig::new());
        options.destroy();
        options.destroy();
        assert_eq!(options, ReaderOptions::default());
    }

    #[test]
    fn parse_flags_set_operations() {
        let mut flags = ReaderOptions::defaults().parse_flags;
        flags.insert(ParseFlags::LOCAL);
        flags.remove(ParseFlags::EXPECT_HOSTNAME);
        assert!(flags.contains(ParseFlags::LOCAL));
        assert!(!flags.contains(ParseFlags::EXPECT_HOSTNAME));
        assert_eq!(format!("{flags:?}"), "ParseFlags(LOCAL)");
        assert_eq!(
            (ParseFlags::LOCAL | ParseFlags::NO_PARSE).bits(),
            ParseFlags::LOCAL.bits() | ParseFlags::NO_PARSE.bits()
        );
    }

    #[test]
    fn source_config_from_json() {
        let config = SourceConfig::from_json_str(
            r#"{
                "device": "/dev/conslog",
                "door": "/var/run/syslog_door",
                "reader": { "msg_size": 8192, "parse_flags": 8 },
                "global": { "log_fetch_limit": 20 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.device, PathBuf::from("/dev/conslog"));
        assert_eq!(config.door, Some(PathBuf::from("/var/run/syslog_door")));
        assert_eq!(config.reader.msg_size, 8192);
        assert!(config.reader.parse_flags.contains(ParseFlags::ASSUME_UTF8));
        assert_eq!(config.global.log_fetch_limit, 20);
        assert_eq!(config.global.log_msg_size, DEFAULT_LOG_MSG_SIZE);
    }

    #[test]
    fn source_config_defaults() {
        let config = SourceConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SourceConfig::default());
        assert_eq!(config.device, PathBuf::from(DEFAULT_DEVICE));
    }

    #[test]
    fn source_config_rejects_bad_values() {
        assert!(matches!(
            SourceConfig::from_json_str(r#"{"device": ""}"#),
            Err(SourceError::EmptyDevicePath)
        ));
        assert!(matches!(
            SourceConfig::from_json_str(r#"{"door": ""}"#),
            Err(SourceError::Config(_))
        ));
        assert!(matches!(
            SourceConfig::from_json_str(r#"{"global": {"log_msg_size": 0}}"#),
            Err(SourceError::Config(_))
        ));
        assert!(matches!(
            SourceConfig::from_json_str("not json"),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn source_config_missing_file() {
        let err = SourceConfig::from_path(Path::new("/nonexistent/strlog.json")).unwrap_err();
        assert!(matches!(err, SourceError::ReadConfig { .. }));
    }

    #[test]
    fn apply_merges_into_driver_options() {
        let config = SourceConfig::from_json_str(r#"{"reader": {"fetch_limit": 4}}"#).unwrap();
        let mut options = ReaderOptions {
            msg_size: 512,
            parse_flags: ParseFlags::LOCAL,
            ..ReaderOptions::default()
        };
        config.apply_reader_options(&mut options);
        assert_eq!(options.msg_size, 512);
        assert_eq!(options.fetch_limit, 4);
        assert!(options.parse_flags.contains(ParseFlags::LOCAL));
    }
}
