//! Task identity, status and the caller-facing handle.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{timeout_error, BoxError, PatternResult, TaskError};

/// Work submitted to a queue.
pub type TaskAction = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'static>;

/// Unique identifier for a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new random task id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a task.
///
/// `Pending -> Executing -> Finished` on the normal path, `Pending -> Cancelled`
/// when cancelled before the worker starts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for its ready time or for the worker.
    Pending,
    /// The action is running.
    Executing,
    /// Cancelled before it started; the action never ran.
    Cancelled,
    /// The action returned, successfully or not.
    Finished,
}

impl TaskStatus {
    /// Returns true for `Cancelled` and `Finished`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Finished)
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Executing => 1,
            Self::Cancelled => 2,
            Self::Finished => 3,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Pending,
            1 => Self::Executing,
            2 => Self::Cancelled,
            _ => Self::Finished,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Cancelled => "cancelled",
            Self::Finished => "finished",
        };
        f.write_str(s)
    }
}

#[derive(Default)]
struct TaskRecord {
    action: Option<TaskAction>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<TaskError>,
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("has_action", &self.action.is_some())
            .field("started_at", &self.started_at)
            .field("finished_at", &self.finished_at)
            .field("error", &self.error)
            .finish()
    }
}

/// State shared between the queue, its worker and every handle.
///
/// Status transitions happen under `record`'s lock with a compare-and-swap on
/// `status`, so a racing start and cancel have exactly one winner and waiters
/// never miss the terminal notification. The action lives in the record until
/// the worker takes it to run, or a cancel drops it.
#[derive(Debug)]
pub(crate) struct TaskShared {
    id: TaskId,
    category: String,
    delay: Duration,
    submitted_at: DateTime<Utc>,
    status: AtomicU8,
    record: Mutex<TaskRecord>,
    done: Condvar,
}

impl TaskShared {
    pub(crate) fn new(category: String, delay: Duration, action: TaskAction) -> Self {
        Self {
            id: TaskId::new(),
            category,
            delay,
            submitted_at: Utc::now(),
            status: AtomicU8::new(TaskStatus::Pending.as_u8()),
            record: Mutex::new(TaskRecord {
                action: Some(action),
                ..TaskRecord::default()
            }),
            done: Condvar::new(),
        }
    }

    pub(crate) const fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn category(&self) -> &str {
        &self.category
    }

    pub(crate) fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn lock_record(&self) -> MutexGuard<'_, TaskRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, from: TaskStatus, to: TaskStatus) -> bool {
        self.status
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Pending -> Executing, handing the action to the caller. Returns `None`
    /// if the task was cancelled first.
    pub(crate) fn try_start(&self) -> Option<TaskAction> {
        let mut record = self.lock_record();
        if !self.transition(TaskStatus::Pending, TaskStatus::Executing) {
            return None;
        }
        record.started_at = Some(Utc::now());
        record.action.take()
    }

    /// Pending -> Cancelled, dropping the action. Returns false if the task
    /// already started.
    pub(crate) fn try_cancel(&self) -> bool {
        let action = {
            let mut record = self.lock_record();
            if !self.transition(TaskStatus::Pending, TaskStatus::Cancelled) {
                return false;
            }
            record.finished_at = Some(Utc::now());
            record.action.take()
        };
        // Captured state is released outside the lock.
        drop(action);
        self.done.notify_all();
        true
    }

    /// Executing -> Finished, recording the action's error if any.
    pub(crate) fn finish(&self, error: Option<TaskError>) {
        {
            let mut record = self.lock_record();
            record.finished_at = Some(Utc::now());
            record.error = error;
            self.status.store(TaskStatus::Finished.as_u8(), Ordering::Release);
        }
        self.done.notify_all();
    }
}

/// Caller-facing view of a submitted task.
///
/// Handles are cheap to clone; dropping every handle does not cancel the task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl TaskHandle {
    pub(crate) fn new(shared: Arc<TaskShared>) -> Self {
        Self { shared }
    }

    /// The task's unique id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    /// The category the task was submitted under.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.shared.category
    }

    /// The delay requested at submission.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.shared.delay
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.shared.status()
    }

    /// Returns true once the task is `Cancelled` or `Finished`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// The action's failure, if it finished with one.
    #[must_use]
    pub fn error(&self) -> Option<TaskError> {
        self.shared.lock_record().error.clone()
    }

    /// When the task was submitted.
    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.shared.submitted_at
    }

    /// When the worker started the action, if it has.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.shared.lock_record().started_at
    }

    /// When the task reached a terminal status, if it has.
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.shared.lock_record().finished_at
    }

    /// Block until the task reaches a terminal status.
    pub fn wait(&self) -> TaskStatus {
        let mut record = self.shared.lock_record();
        loop {
            let status = self.shared.status();
            if status.is_terminal() {
                return status;
            }
            record = self.shared.done.wait(record).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the task reaches a terminal status or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> PatternResult<TaskStatus> {
        let record = self.shared.lock_record();
        let (_record, result) = self
            .shared
            .done
            .wait_timeout_while(record, timeout, |_| !self.shared.status().is_terminal())
            .unwrap_or_else(PoisonError::into_inner);

        let status = self.shared.status();
        if result.timed_out() && !status.is_terminal() {
            return Err(timeout_error(timeout));
        }
        Ok(status)
    }
}
