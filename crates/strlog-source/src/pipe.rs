use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::GlobalConfig;
use crate::error::{Result, SourceError};
use crate::message::MessageSink;

/// Lifecycle hooks every element of the pipe graph implements.
///
/// `init` may be followed by `deinit` whether or not it succeeded; `free`
/// may be called in any state and more than once.
pub trait LogPipe: Send {
    fn init(&mut self, cfg: &GlobalConfig) -> Result<()>;

    fn deinit(&mut self) -> Result<()>;

    fn free(&mut self);
}

/// State shared by all source drivers: identity, the attached destination
/// and the configuration the driver was initialized with.
#[derive(Default)]
pub struct SourceDriverBase {
    id: Option<String>,
    group: Option<String>,
    next: Option<Arc<dyn MessageSink>>,
    cfg: Option<GlobalConfig>,
}

impl SourceDriverBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver identifier used in diagnostics and on every message.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("streams")
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Name of the source group this driver belongs to.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn set_group(&mut self, group: impl Into<String>) {
        self.group = Some(group.into());
    }

    /// Attach the destination messages are forwarded to.
    pub fn append(&mut self, next: Arc<dyn MessageSink>) {
        self.next = Some(next);
    }

    pub fn next(&self) -> Option<&Arc<dyn MessageSink>> {
        self.next.as_ref()
    }

    /// The configuration passed to the last successful `init_method`.
    pub fn config(&self) -> Option<&GlobalConfig> {
        self.cfg.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.cfg.is_some()
    }

    pub fn init_method(&mut self, cfg: &GlobalConfig) -> Result<()> {
        if self.next.is_none() {
            return Err(SourceError::NoDestination {
                id: self.id().to_string(),
            });
        }
        self.cfg = Some(cfg.clone());
        debug!(id = self.id(), "source driver initialized");
        Ok(())
    }

    pub fn deinit_method(&mut self) -> Result<()> {
        if self.cfg.take().is_some() {
            debug!(id = self.id(), "source driver deinitialized");
        }
        Ok(())
    }

    pub fn free_method(&mut self) {
        self.cfg = None;
        self.next = None;
        self.id = None;
        self.group = None;
    }
}

impl fmt::Debug for SourceDriverBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDriverBase")
            .field("id", &self.id())
            .field("group", &self.group)
            .field("has_next", &self.next.is_some())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
