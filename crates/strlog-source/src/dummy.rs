use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::GlobalConfig;
use crate::error::Result;
use crate::pipe::{LogPipe, SourceDriverBase};

/// Stand-in for platforms without STREAMS log devices.
///
/// Accepts the same configuration as the real driver and never reads
/// anything: `init` and `deinit` always succeed and no reader is attached.
#[derive(Debug, Default)]
pub struct DummySourceDriver {
    base: SourceDriverBase,
    dev_filename: Option<PathBuf>,
}

impl DummySourceDriver {
    pub fn new(dev_filename: impl Into<PathBuf>) -> Self {
        Self {
            base: SourceDriverBase::new(),
            dev_filename: Some(dev_filename.into()),
        }
    }

    /// Accepted and ignored.
    pub fn set_door_path(&mut self, _path: impl Into<PathBuf>) -> Result<()> {
        Ok(())
    }

    pub fn device_path(&self) -> Option<&Path> {
        self.dev_filename.as_deref()
    }

    pub fn base(&self) -> &SourceDriverBase {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut SourceDriverBase {
        &mut self.base
    }
}

impl LogPipe for DummySourceDriver {
    fn init(&mut self, _cfg: &GlobalConfig) -> Result<()> {
        info!(
            file = ?self.dev_filename,
            "STREAMS support not available on this platform; source is inert"
        );
        Ok(())
    }

    fn deinit(&mut self) -> Result<()> {
        Ok(())
    }

    fn free(&mut self) {
        self.dev_filename = None;
        self.base.free_method();
    }
}
