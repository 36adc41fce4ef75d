use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TaskError;

use super::task::TaskId;

/// A task lifecycle transition.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Submitted {
        id: TaskId,
        category: String,
        delay: Duration,
    },
    Started {
        id: TaskId,
        category: String,
    },
    Finished {
        id: TaskId,
        category: String,
    },
    Failed {
        id: TaskId,
        category: String,
        error: TaskError,
    },
    Cancelled {
        id: TaskId,
        category: String,
    },
}

impl TaskEvent {
    /// The task this event belongs to.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        match self {
            Self::Submitted { id, .. }
            | Self::Started { id, .. }
            | Self::Finished { id, .. }
            | Self::Failed { id, .. }
            | Self::Cancelled { id, .. } => *id,
        }
    }

    /// The task's category.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Submitted { category, .. }
            | Self::Started { category, .. }
            | Self::Finished { category, .. }
            | Self::Failed { category, .. }
            | Self::Cancelled { category, .. } => category,
        }
    }
}

/// Receives task lifecycle events from a queue.
///
/// `Submitted` and `Cancelled` may be reported on the caller's thread; the
/// rest are reported on the worker thread. Observers must not block.
pub trait TaskObserver: Send + Sync {
    /// Called once per transition.
    fn on_event(&self, event: &TaskEvent);
}

/// Default observer: emits one `tracing` event per transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTaskObserver;

impl TaskObserver for TracingTaskObserver {
    fn on_event(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Submitted { id, category, delay } => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                debug!(task_id = %id, category = %category, delay_ms, "task submitted");
            }
            TaskEvent::Started { id, category } => {
                debug!(task_id = %id, category = %category, "task started");
            }
            TaskEvent::Finished { id, category } => {
                debug!(task_id = %id, category = %category, "task finished");
            }
            TaskEvent::Failed { id, category, error } => {
                warn!(task_id = %id, category = %category, error = %error, "task action failed");
            }
            TaskEvent::Cancelled { id, category } => {
                debug!(task_id = %id, category = %category, "operation is cancelled");
            }
        }
    }
}

/// Deliver `event` to `observer`, containing any panic so a faulty observer
/// cannot take the worker down with it.
pub(crate) fn notify(observer: &dyn TaskObserver, event: &TaskEvent) {
    if panic::catch_unwind(AssertUnwindSafe(|| observer.on_event(event))).is_err() {
        warn!(task_id = %event.id(), category = %event.category(), "task observer panicked");
    }
}
