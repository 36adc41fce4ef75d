//! Single-worker delayed task queue.
//!
//! Submissions travel to a dedicated worker thread over an unbounded channel
//! and are kept in a min-heap ordered by ready time, then submission sequence.
//! The worker sleeps on `select!` until either a new message arrives or the
//! earliest deadline fires, so there is no polling. Cancellation never waits
//! for the worker: it flips the task's status and drops its action directly,
//! then asks the worker to purge the dead heap entries.

use std::any::Any;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{at, never, select, unbounded, Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::config::{QueueConfig, ShutdownMode};
use crate::error::{BoxError, ExecutionError, PatternError, PatternResult, TaskError};

use super::observer::{notify, TaskEvent, TaskObserver, TracingTaskObserver};
use super::task::{TaskHandle, TaskId, TaskShared, TaskStatus};

// Deadlines past this are clamped; `Instant` arithmetic panics on overflow.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

type TaskMap = HashMap<TaskId, Arc<TaskShared>>;
type Registry = Arc<Mutex<TaskMap>>;

fn lock_registry(registry: &Mutex<TaskMap>) -> MutexGuard<'_, TaskMap> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ScheduledTask {
    ready_at: Instant,
    seq: u64,
    shared: Arc<TaskShared>,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    // Reversed so `BinaryHeap` pops the earliest ready time, then lowest seq.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

enum Control {
    Submit(ScheduledTask),
    /// Drop heap entries whose task is no longer pending.
    Purge,
}

/// A FIFO queue that runs tasks on one worker thread after an optional delay.
///
/// Tasks become ready at `submission + delay` and start in ready-time order,
/// ties broken by submission order. Pending tasks can be cancelled by
/// category; a task that has started always runs to completion.
///
/// Dropping the queue (or calling [`DelayedTaskQueue::shutdown`]) closes it
/// and joins the worker according to the configured [`ShutdownMode`].
pub struct DelayedTaskQueue {
    name: String,
    control_tx: Sender<Control>,
    registry: Registry,
    observer: Arc<dyn TaskObserver>,
    next_seq: AtomicU64,
    join: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for DelayedTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedTaskQueue")
            .field("name", &self.name)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl DelayedTaskQueue {
    /// Start a queue whose lifecycle events are logged through `tracing`.
    pub fn new(config: QueueConfig) -> PatternResult<Self> {
        Self::with_observer(config, Arc::new(TracingTaskObserver))
    }

    /// Start a queue reporting lifecycle events to `observer`.
    pub fn with_observer(
        config: QueueConfig,
        observer: Arc<dyn TaskObserver>,
    ) -> PatternResult<Self> {
        config.validate()?;

        let (control_tx, control_rx) = unbounded::<Control>();
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));

        let worker = Worker {
            control_rx,
            registry: Arc::clone(&registry),
            observer: Arc::clone(&observer),
            shutdown: config.shutdown,
        };
        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || worker.run())
            .map_err(|e| {
                PatternError::Execution(ExecutionError::WorkerSpawn {
                    message: e.to_string(),
                })
            })?;

        info!(queue = %config.name, shutdown = ?config.shutdown, "delayed task queue started");

        Ok(Self {
            name: config.name,
            control_tx,
            registry,
            observer,
            next_seq: AtomicU64::new(0),
            join: Some(join),
        })
    }

    /// The queue's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue `action` under `category`, eligible to start after `delay`.
    ///
    /// Never waits for the task to run or for room in the queue; observe
    /// completion through the returned handle.
    pub fn submit<F>(
        &self,
        category: impl Into<String>,
        delay: Duration,
        action: F,
    ) -> PatternResult<TaskHandle>
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        let now = Instant::now();
        let ready_at = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let shared = Arc::new(TaskShared::new(category.into(), delay, Box::new(action)));
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        lock_registry(&self.registry).insert(shared.id(), Arc::clone(&shared));

        // Reported before the worker can see the task, so observers always
        // get `Submitted` first.
        notify(
            self.observer.as_ref(),
            &TaskEvent::Submitted {
                id: shared.id(),
                category: shared.category().to_string(),
                delay,
            },
        );

        let task = ScheduledTask {
            ready_at,
            seq,
            shared: Arc::clone(&shared),
        };
        if self.control_tx.send(Control::Submit(task)).is_err() {
            lock_registry(&self.registry).remove(&shared.id());
            if shared.try_cancel() {
                notify(self.observer.as_ref(), &cancelled_event(&shared));
            }
            return Err(PatternError::Execution(ExecutionError::QueueClosed {
                queue: self.name.clone(),
            }));
        }

        Ok(TaskHandle::new(shared))
    }

    /// Like [`submit`](Self::submit), with the delay given in seconds.
    ///
    /// Zero, negative and non-finite delays mean "start as soon as possible".
    pub fn submit_after_secs<F>(
        &self,
        category: impl Into<String>,
        secs: f64,
        action: F,
    ) -> PatternResult<TaskHandle>
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.submit(category, delay_from_secs(secs), action)
    }

    /// Cancel every pending task in `category`.
    ///
    /// Returns how many tasks were cancelled. Tasks already executing or
    /// finished are left alone; zero matches is not an error.
    pub fn cancel(&self, category: &str) -> usize {
        let cancelled: Vec<Arc<TaskShared>> = {
            let mut registry = lock_registry(&self.registry);
            let hits: Vec<Arc<TaskShared>> = registry
                .values()
                .filter(|task| task.category() == category && task.try_cancel())
                .cloned()
                .collect();
            for task in &hits {
                registry.remove(&task.id());
            }
            hits
        };

        if !cancelled.is_empty() {
            // Only fails once the worker is gone, and then there is no heap.
            let _ = self.control_tx.send(Control::Purge);
        }
        for task in &cancelled {
            notify(self.observer.as_ref(), &cancelled_event(task));
        }
        debug!(queue = %self.name, category, cancelled = cancelled.len(), "cancel requested");
        cancelled.len()
    }

    /// Number of tasks still waiting to start.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock_registry(&self.registry)
            .values()
            .filter(|task| task.status() == TaskStatus::Pending)
            .count()
    }

    /// Number of tasks in `category` still waiting to start.
    #[must_use]
    pub fn pending_in(&self, category: &str) -> usize {
        lock_registry(&self.registry)
            .values()
            .filter(|task| task.category() == category && task.status() == TaskStatus::Pending)
            .count()
    }

    /// Close the queue and wait for the worker to exit.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for DelayedTaskQueue {
    fn drop(&mut self) {
        // Closing the only sender lets the worker observe disconnection.
        let (dummy_tx, _) = unbounded::<Control>();
        let old_tx = std::mem::replace(&mut self.control_tx, dummy_tx);
        drop(old_tx);

        if let Some(handle) = self.join.take() {
            if let Err(payload) = handle.join() {
                warn!(
                    queue = %self.name,
                    panic = %panic_message(payload.as_ref()),
                    "delayed task queue worker panicked"
                );
            }
        }
        info!(queue = %self.name, "delayed task queue stopped");
    }
}

fn cancelled_event(task: &TaskShared) -> TaskEvent {
    TaskEvent::Cancelled {
        id: task.id(),
        category: task.category().to_string(),
    }
}

fn delay_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(FAR_FUTURE)
    } else {
        Duration::ZERO
    }
}

struct Worker {
    control_rx: Receiver<Control>,
    registry: Registry,
    observer: Arc<dyn TaskObserver>,
    shutdown: ShutdownMode,
}

impl Worker {
    fn run(self) {
        let mut heap: BinaryHeap<ScheduledTask> = BinaryHeap::new();
        let mut closed = false;

        loop {
            closed |= self.drain_control(&mut heap);
            discard_cancelled_heads(&mut heap);

            if closed && self.shutdown == ShutdownMode::CancelPending {
                self.cancel_all(heap);
                return;
            }

            if let Some(task) = pop_ready(&mut heap, Instant::now()) {
                self.execute(task);
                continue;
            }

            if closed {
                // Draining: nothing can be submitted or cancelled any more.
                let Some(next) = heap.peek() else {
                    return;
                };
                thread::sleep(next.ready_at.saturating_duration_since(Instant::now()));
                continue;
            }

            let timer = heap.peek().map_or_else(never, |next| at(next.ready_at));
            select! {
                recv(self.control_rx) -> msg => match msg {
                    Ok(control) => apply(control, &mut heap),
                    Err(_) => closed = true,
                },
                recv(timer) -> _ => {}
            }
        }
    }

    /// Apply every queued control message. Returns true once the channel is
    /// disconnected.
    fn drain_control(&self, heap: &mut BinaryHeap<ScheduledTask>) -> bool {
        loop {
            match self.control_rx.try_recv() {
                Ok(control) => apply(control, heap),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    fn execute(&self, task: ScheduledTask) {
        let ScheduledTask { shared, .. } = task;

        let Some(action) = shared.try_start() else {
            // Cancelled while waiting; the canceller already reported it.
            return;
        };

        let id = shared.id();
        let category = shared.category().to_string();
        notify(
            self.observer.as_ref(),
            &TaskEvent::Started {
                id,
                category: category.clone(),
            },
        );

        let error = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(TaskError::ActionFailed {
                category: category.clone(),
                message: err.to_string(),
            }),
            Err(payload) => Some(TaskError::ActionFailed {
                category: category.clone(),
                message: panic_message(payload.as_ref()),
            }),
        };

        lock_registry(&self.registry).remove(&id);
        shared.finish(error.clone());

        let event = match error {
            None => TaskEvent::Finished { id, category },
            Some(error) => TaskEvent::Failed { id, category, error },
        };
        notify(self.observer.as_ref(), &event);
    }

    fn cancel_all(&self, heap: BinaryHeap<ScheduledTask>) {
        for task in heap {
            if task.shared.try_cancel() {
                notify(self.observer.as_ref(), &cancelled_event(&task.shared));
            }
        }
        lock_registry(&self.registry).clear();
    }
}

fn apply(control: Control, heap: &mut BinaryHeap<ScheduledTask>) {
    match control {
        Control::Submit(task) => heap.push(task),
        Control::Purge => heap.retain(|task| task.shared.status() == TaskStatus::Pending),
    }
}

/// Pop entries off the top of the heap whose task was cancelled, so the next
/// deadline belongs to a task that can still run.
fn discard_cancelled_heads(heap: &mut BinaryHeap<ScheduledTask>) {
    while heap
        .peek()
        .is_some_and(|next| next.shared.status() != TaskStatus::Pending)
    {
        heap.pop();
    }
}

fn pop_ready(heap: &mut BinaryHeap<ScheduledTask>, now: Instant) -> Option<ScheduledTask> {
    if heap.peek().is_some_and(|next| next.ready_at <= now) {
        heap.pop()
    } else {
        None
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn queue() -> DelayedTaskQueue {
        DelayedTaskQueue::new(QueueConfig::named("test-queue")).unwrap()
    }

    fn dummy(seq: u64, ready_at: Instant) -> ScheduledTask {
        let shared = TaskShared::new("x".to_string(), Duration::ZERO, Box::new(|| Ok(())));
        ScheduledTask {
            ready_at,
            seq,
            shared: Arc::new(shared),
        }
    }

    #[test]
    fn heap_orders_by_ready_time_then_seq() {
        let base = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(dummy(0, base + Duration::from_millis(20)));
        heap.push(dummy(1, base));
        heap.push(dummy(2, base + Duration::from_millis(5)));
        heap.push(dummy(3, base));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop()).map(|t| t.seq).collect();
        assert_eq!(order, vec![1, 3, 2, 0]);
    }

    #[test]
    fn pop_ready_respects_deadline() {
        let base = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(dummy(0, base + Duration::from_secs(60)));
        assert!(pop_ready(&mut heap, base).is_none());
        assert!(pop_ready(&mut heap, base + Duration::from_secs(61)).is_some());
    }

    #[test]
    fn delay_from_secs_clamps_non_positive() {
        assert_eq!(delay_from_secs(0.0), Duration::ZERO);
        assert_eq!(delay_from_secs(-3.0), Duration::ZERO);
        assert_eq!(delay_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(delay_from_secs(f64::INFINITY), Duration::ZERO);
        assert_eq!(delay_from_secs(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn panic_message_extracts_payload() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "panicked: boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "panicked: bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "panicked");
    }

    #[test]
    fn immediate_task_runs() {
        let q = queue();
        let (tx, rx) = unbounded();
        let handle = q
            .submit("door", Duration::ZERO, move || {
                tx.send(()).map_err(|e| Box::new(e) as BoxError)
            })
            .unwrap();

        assert_eq!(handle.wait_timeout(Duration::from_secs(2)).unwrap(), TaskStatus::Finished);
        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(handle.error().is_none());
        assert!(handle.started_at().is_some());
        assert_eq!(q.pending_count(), 0);
    }

    #[test]
    fn cancel_unknown_category_is_noop() {
        let q = queue();
        assert_eq!(q.cancel("nothing"), 0);
        assert_eq!(q.pending_count(), 0);
    }

    #[test]
    fn delayed_task_can_be_cancelled() {
        let q = queue();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        let handle = q
            .submit("taxi", Duration::from_secs(30), move || {
                ran2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        assert_eq!(q.pending_in("taxi"), 1);
        assert_eq!(q.cancel("taxi"), 1);
        assert_eq!(handle.status(), TaskStatus::Cancelled);
        assert_eq!(q.pending_in("taxi"), 0);
        assert_eq!(q.cancel("taxi"), 0);

        q.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn action_error_is_recorded() {
        let q = queue();
        let handle = q
            .submit("door", Duration::ZERO, || Err("door is jammed".into()))
            .unwrap();

        assert_eq!(handle.wait_timeout(Duration::from_secs(2)).unwrap(), TaskStatus::Finished);
        let Some(TaskError::ActionFailed { category, message }) = handle.error() else {
            panic!("expected ActionFailed");
        };
        assert_eq!(category, "door");
        assert_eq!(message, "door is jammed");
    }

    #[test]
    fn panicking_action_does_not_kill_worker() {
        let q = queue();
        let bad = q
            .submit("window", Duration::ZERO, || panic!("glass broke"))
            .unwrap();
        let good = q.submit("door", Duration::ZERO, || Ok(())).unwrap();

        assert_eq!(bad.wait_timeout(Duration::from_secs(2)).unwrap(), TaskStatus::Finished);
        assert!(bad.error().unwrap().to_string().contains("glass broke"));
        assert_eq!(good.wait_timeout(Duration::from_secs(2)).unwrap(), TaskStatus::Finished);
        assert!(good.error().is_none());
    }

    #[test]
    fn purge_drops_cancelled_entries() {
        let base = Instant::now();
        let mut heap = BinaryHeap::new();
        let kept = dummy(0, base + Duration::from_secs(60));
        let gone = dummy(1, base + Duration::from_secs(30));
        assert!(gone.shared.try_cancel());
        heap.push(kept);
        heap.push(gone);

        apply(Control::Purge, &mut heap);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.peek().map(|t| t.seq), Some(0));
    }

    #[test]
    fn cancelled_heads_are_discarded() {
        let base = Instant::now();
        let mut heap = BinaryHeap::new();
        let first = dummy(0, base);
        let second = dummy(1, base + Duration::from_secs(3600));
        let third = dummy(2, base + Duration::from_secs(7200));
        assert!(first.shared.try_cancel());
        assert!(second.shared.try_cancel());
        heap.push(first);
        heap.push(second);
        heap.push(third);

        discard_cancelled_heads(&mut heap);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.peek().map(|t| t.seq), Some(2));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = DelayedTaskQueue::new(QueueConfig::named("")).unwrap_err();
        assert!(err.is_config());
    }
}
