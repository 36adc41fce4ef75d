//! Shortcut commands on top of the delayed task queue.
//!
//! A [`Shortcut`] expands into one or more [`HomeCommand`]s. Each command is
//! submitted as its own task under the command's category, so cancelling a
//! shortcut cancels exactly the commands it would have run. The work itself
//! is done by a [`HomeAutomation`] receiver supplied by the caller.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BoxError, ConfigError, PatternResult};
use crate::queue::{DelayedTaskQueue, TaskHandle};

/// A single command a receiver knows how to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeCommand {
    /// Close the windows.
    Window,
    /// Lock the doors.
    Door,
    /// Order a taxi.
    Taxi,
}

impl HomeCommand {
    /// Queue category used for this command's tasks.
    #[must_use]
    pub const fn category(self) -> &'static str {
        match self {
            Self::Window => "window",
            Self::Door => "door",
            Self::Taxi => "taxi",
        }
    }
}

impl fmt::Display for HomeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// A high-level request that expands into several commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shortcut {
    /// Close the windows and lock the doors.
    LeaveHome,
    /// Order a taxi.
    LeaveWork,
}

impl Shortcut {
    /// The commands this shortcut runs, in submission order.
    #[must_use]
    pub const fn commands(self) -> &'static [HomeCommand] {
        match self {
            Self::LeaveHome => &[HomeCommand::Window, HomeCommand::Door],
            Self::LeaveWork => &[HomeCommand::Taxi],
        }
    }

    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeaveHome => "leave_home",
            Self::LeaveWork => "leave_work",
        }
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shortcut {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "leave_home" => Ok(Self::LeaveHome),
            "leave_work" => Ok(Self::LeaveWork),
            other => Err(ConfigError::Invalid {
                field: "shortcut".to_string(),
                reason: format!("unknown shortcut '{other}'"),
            }),
        }
    }
}

/// The receiver that actually performs commands.
pub trait HomeAutomation: Send + Sync {
    /// Carry out `command`. Errors are recorded on the task's handle.
    fn execute(&self, command: HomeCommand) -> Result<(), BoxError>;
}

/// Receiver that only logs what it would have done.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAutomation;

impl HomeAutomation for LoggingAutomation {
    fn execute(&self, command: HomeCommand) -> Result<(), BoxError> {
        match command {
            HomeCommand::Window => info!(command = %command, "windows are closed"),
            HomeCommand::Door => info!(command = %command, "doors are locked"),
            HomeCommand::Taxi => info!(command = %command, "taxi is ordered"),
        }
        Ok(())
    }
}

/// Invoker mapping shortcuts to queued commands.
pub struct ShortcutDispatcher {
    queue: Arc<DelayedTaskQueue>,
    automation: Arc<dyn HomeAutomation>,
}

impl fmt::Debug for ShortcutDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortcutDispatcher")
            .field("queue", &self.queue.name())
            .finish_non_exhaustive()
    }
}

impl ShortcutDispatcher {
    /// Dispatch onto `queue`, carrying commands out with `automation`.
    #[must_use]
    pub fn new(queue: Arc<DelayedTaskQueue>, automation: Arc<dyn HomeAutomation>) -> Self {
        Self { queue, automation }
    }

    /// The queue commands are submitted to.
    #[must_use]
    pub fn queue(&self) -> &Arc<DelayedTaskQueue> {
        &self.queue
    }

    /// Submit every command of `shortcut`, each after `delay`.
    ///
    /// Stops at the first submission error; commands already queued stay
    /// queued.
    pub fn perform(
        &self,
        shortcut: Shortcut,
        delay: Duration,
    ) -> PatternResult<Vec<TaskHandle>> {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        info!(shortcut = %shortcut, delay_ms, "performing shortcut");

        shortcut
            .commands()
            .iter()
            .map(|&command| {
                let automation = Arc::clone(&self.automation);
                self.queue
                    .submit(command.category(), delay, move || automation.execute(command))
            })
            .collect()
    }

    /// Cancel every pending command of `shortcut`. Returns how many tasks
    /// were cancelled.
    pub fn cancel(&self, shortcut: Shortcut) -> usize {
        info!(shortcut = %shortcut, "cancelling shortcut");
        shortcut
            .commands()
            .iter()
            .map(|command| self.queue.cancel(command.category()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::config::QueueConfig;
    use crate::queue::TaskStatus;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<HomeCommand>>);

    impl HomeAutomation for Recorder {
        fn execute(&self, command: HomeCommand) -> Result<(), BoxError> {
            self.0.lock().unwrap().push(command);
            Ok(())
        }
    }

    fn dispatcher(recorder: &Arc<Recorder>) -> ShortcutDispatcher {
        let queue = Arc::new(DelayedTaskQueue::new(QueueConfig::named("shortcuts-test")).unwrap());
        ShortcutDispatcher::new(queue, Arc::clone(recorder) as Arc<dyn HomeAutomation>)
    }

    #[test]
    fn shortcut_expansion() {
        assert_eq!(Shortcut::LeaveHome.commands(), [HomeCommand::Window, HomeCommand::Door]);
        assert_eq!(Shortcut::LeaveWork.commands(), [HomeCommand::Taxi]);
        assert_eq!(HomeCommand::Door.category(), "door");
    }

    #[test]
    fn shortcut_parsing() {
        assert_eq!("leave_home".parse::<Shortcut>().unwrap(), Shortcut::LeaveHome);
        assert_eq!(" leave_work ".parse::<Shortcut>().unwrap(), Shortcut::LeaveWork);
        assert!("go_home".parse::<Shortcut>().is_err());
        assert_eq!(Shortcut::LeaveWork.to_string(), "leave_work");
    }

    #[test]
    fn perform_runs_commands_in_order() {
        let recorder = Arc::new(Recorder::default());
        let d = dispatcher(&recorder);

        let handles = d.perform(Shortcut::LeaveHome, Duration::ZERO).unwrap();
        assert_eq!(handles.len(), 2);
        for h in &handles {
            assert_eq!(h.wait_timeout(Duration::from_secs(2)).unwrap(), TaskStatus::Finished);
        }
        assert_eq!(*recorder.0.lock().unwrap(), vec![HomeCommand::Window, HomeCommand::Door]);
    }

    #[test]
    fn cancel_prevents_delayed_shortcut() {
        let recorder = Arc::new(Recorder::default());
        let d = dispatcher(&recorder);

        let handles = d.perform(Shortcut::LeaveWork, Duration::from_secs(3)).unwrap();
        assert_eq!(d.cancel(Shortcut::LeaveWork), 1);
        assert_eq!(handles[0].status(), TaskStatus::Cancelled);
        assert_eq!(d.cancel(Shortcut::LeaveWork), 0);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn logging_automation_succeeds() {
        assert!(LoggingAutomation.execute(HomeCommand::Taxi).is_ok());
    }
}
