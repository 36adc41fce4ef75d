//! # patternworks - Shared state caching and delayed command queues
//!
//! patternworks provides two small in-process building blocks:
//!
//! - **Flyweight cache**: interns immutable shared state by its attributes so
//!   every caller asking for the same attributes receives the same instance.
//! - **Delayed task queue**: runs commands on a single worker thread after an
//!   optional delay, with cancellation by category for tasks not yet started.
//!
//! A thin shortcut layer maps high-level requests onto queued commands.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use patternworks::{DelayedTaskQueue, FlyweightFactory, QueueConfig, TaskStatus};
//!
//! let factory = FlyweightFactory::with_states([["BMW", "M5", "red"]]);
//! let m5 = factory.get(&["BMW", "M5", "red"]);
//! assert!(Arc::ptr_eq(&m5, &factory.get(&["BMW", "M5", "red"])));
//!
//! let queue = DelayedTaskQueue::new(QueueConfig::named("home"))?;
//! let door = queue.submit("door", Duration::ZERO, || Ok(()))?;
//! let taxi = queue.submit("taxi", Duration::from_secs(5), || Ok(()))?;
//! queue.cancel("taxi");
//! assert_eq!(door.wait(), TaskStatus::Finished);
//! assert_eq!(taxi.status(), TaskStatus::Cancelled);
//! # Ok::<(), patternworks::PatternError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod flyweight;
pub mod logging;
pub mod queue;
pub mod shortcuts;

// Re-export primary types at crate root for convenience
pub use config::{FlyweightConfig, PatternworksConfig, QueueConfig, ShutdownMode};
pub use error::{BoxError, ConfigError, ExecutionError, PatternError, PatternResult, TaskError};
pub use flyweight::{CacheEvent, CacheObserver, FlyweightFactory, FlyweightRegistry, SharedState};
pub use queue::{DelayedTaskQueue, TaskEvent, TaskHandle, TaskId, TaskObserver, TaskStatus};
pub use shortcuts::{HomeAutomation, HomeCommand, LoggingAutomation, Shortcut, ShortcutDispatcher};
