//! Orderly process teardown.
//!
//! One cancellation token is shared with every long-lived task; the tasks
//! themselves are tracked under a name so the shutdown log says who
//! drained cleanly and who had to be cut off. Draining walks the tracked
//! tasks against a single deadline and aborts whichever ones miss it.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A named long-lived task awaiting drain.
struct TrackedTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Coordinates teardown of the server's long-lived tasks.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<TrackedTask>>,
}

impl ShutdownCoordinator {
    /// Grace period tracked tasks get to finish once shutdown triggers.
    pub const DRAIN_GRACE: Duration = Duration::from_secs(20);

    /// Create a coordinator with no tracked tasks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The token long-lived tasks should select on.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Track `handle` under `name` for draining at shutdown.
    pub fn register(&self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.lock().push(TrackedTask { name, handle });
    }

    /// Signal every token holder to wind down. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger shutdown and drain every tracked task.
    ///
    /// All tasks share one deadline, `grace` from now. A task still
    /// running when the deadline passes is aborted, and the drain moves
    /// on to the next one.
    pub async fn drain(&self, grace: Duration) {
        self.trigger();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        debug!(
            tasks = tasks.len(),
            grace_secs = grace.as_secs(),
            "draining tracked tasks"
        );

        let deadline = tokio::time::Instant::now() + grace;
        for TrackedTask { name, handle } in tasks {
            let abort = handle.abort_handle();
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(_) => debug!(task = name, "task drained"),
                Err(_) => {
                    warn!(task = name, "task missed the shutdown deadline, aborting");
                    abort.abort();
                }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
