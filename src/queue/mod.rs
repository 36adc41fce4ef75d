//! Cancellable delayed task queue.
//!
//! Each queue owns one worker thread. Tasks carry a category tag used for
//! bulk cancellation, and a handle that reports their status as they move
//! through `Pending`, `Executing` and a terminal `Finished` or `Cancelled`.

/// Task lifecycle observers.
pub mod observer;
/// Queue and worker loop.
pub mod scheduler;
/// Task ids, status and handles.
pub mod task;

pub use observer::{TaskEvent, TaskObserver, TracingTaskObserver};
pub use scheduler::DelayedTaskQueue;
pub use task::{TaskAction, TaskHandle, TaskId, TaskStatus};
