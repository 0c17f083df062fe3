use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Process lifecycle points callbacks can be attached to, in firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookPoint {
    /// Configuration loaded, before the process detaches.
    Startup,
    /// The process finished forking and daemonizing.
    PostDaemonized,
    /// Shutdown requested, pipes still running.
    PreShutdown,
    /// Pipes are torn down.
    Shutdown,
}

/// A one-shot callback fired at a [`HookPoint`].
pub type HookFn = Box<dyn FnOnce(HookPoint) + Send>;

#[derive(Default)]
struct HooksInner {
    reached: Option<HookPoint>,
    pending: Vec<(HookPoint, HookFn)>,
}

/// Registry of application lifecycle callbacks.
///
/// Shared through `Arc` and handed to pipes with the global configuration,
/// so tests can fire hook points without forking.
#[derive(Default)]
pub struct AppHooks {
    inner: Mutex<HooksInner>,
}

impl AppHooks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HooksInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `callback` for `point`.
    ///
    /// If `point` has already been reached the callback runs immediately, on
    /// the calling thread. Once shutdown has begun, callbacks for points left
    /// behind are discarded instead, the same way `run` drops skipped ones.
    pub fn register(&self, point: HookPoint, callback: HookFn) {
        let mut inner = self.lock();
        let Some(reached) = inner.reached.filter(|reached| *reached >= point) else {
            inner.pending.push((point, callback));
            return;
        };
        drop(inner);

        if reached >= HookPoint::PreShutdown && point < reached {
            debug!(?point, ?reached, "discarding application hook registered during shutdown");
            return;
        }
        debug!(?point, "application hook registered after its point passed; running now");
        callback(point);
    }

    /// Mark `point` as reached and fire its callbacks in registration order.
    ///
    /// Callbacks still queued for earlier points are discarded.
    pub fn run(&self, point: HookPoint) {
        let due = {
            let mut inner = self.lock();
            if inner.reached.is_some_and(|reached| reached >= point) {
                debug!(?point, "application hook point already reached");
                return;
            }
            inner.reached = Some(point);

            let (due, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.pending)
                .into_iter()
                .partition(|(p, _)| *p <= point);
            inner.pending = keep;
            due
        };

        for (registered, callback) in due {
            if registered == point {
                callback(point);
            } else {
                debug!(point = ?registered, "discarding application hook for skipped point");
            }
        }
    }

    /// The last hook point reached, if any.
    pub fn current(&self) -> Option<HookPoint> {
        self.lock().reached
    }

    /// Number of callbacks waiting for `point`.
    pub fn pending(&self, point: HookPoint) -> usize {
        self.lock().pending.iter().filter(|(p, _)| *p == point).count()
    }
}

impl fmt::Debug for AppHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("AppHooks")
            .field("reached", &inner.reached)
            .field("pending", &inner.pending.len())
            .finish()
    }
}
