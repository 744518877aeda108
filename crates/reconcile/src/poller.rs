//! Bounded wait for asynchronous remote actions.
//!
//! After a mutating call starts a remote task, the poller re-reads the
//! task on a fixed interval until it reaches a terminal status or the
//! deadline elapses. A timeout abandons the wait only; the remote task is
//! never cancelled and may still finish later.

use crate::error::{Error, Result};
use crate::types::{RemoteActionTask, TaskStatus};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Interval between status reads used by the remote API's own tooling.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long to wait for an action when the caller does not say.
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(300);

/// Shortest interval the poller will use; shorter ones are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Source of time for the poller.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time with real sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Simulated time: `sleep` advances the clock instantly.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        match self.offset.lock() {
            Ok(offset) => *offset,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut offset = match self.offset.lock() {
            Ok(offset) => offset,
            Err(poisoned) => poisoned.into_inner(),
        };
        *offset += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Poll timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Time between status reads.
    pub interval: Duration,
    /// Maximum time to wait before giving up locally.
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_POLL_DEADLINE,
        }
    }
}

impl PollConfig {
    /// Poll timing; `interval` is raised to [`MIN_POLL_INTERVAL`] if shorter.
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }.clamped()
    }

    fn clamped(mut self) -> Self {
        if self.interval < MIN_POLL_INTERVAL {
            log::warn!(
                "Poll interval {}ms is too short; using {}s",
                self.interval.as_millis(),
                MIN_POLL_INTERVAL.as_secs()
            );
            self.interval = MIN_POLL_INTERVAL;
        }
        self
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(RemoteActionTask),
    Failed(RemoteActionTask),
    /// Deadline elapsed; the remote task may still be in flight.
    TimedOut {
        task: RemoteActionTask,
        waited: Duration,
    },
}

impl PollOutcome {
    /// Map the outcome to success or the matching error.
    pub fn into_result(self) -> Result<RemoteActionTask> {
        match self {
            PollOutcome::Completed(task) => Ok(task),
            PollOutcome::Failed(task) => Err(Error::ActionFailed {
                message: task
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("status {}", task.status)),
                task_id: task.task_id,
            }),
            PollOutcome::TimedOut { task, waited } => Err(Error::TimedOut {
                task_id: task.task_id,
                waited,
            }),
        }
    }
}

/// Callback trait for poll progress notifications.
pub trait PollCallback: Sync {
    /// Called after every status read.
    ///
    /// # Arguments
    /// * `attempt` - Poll number (1-indexed)
    /// * `task` - Latest known task state
    /// * `elapsed` - Time since the wait started
    fn on_poll(&self, attempt: u32, task: &RemoteActionTask, elapsed: Duration);
}

/// No-op callback that does nothing.
pub struct NoCallback;

impl PollCallback for NoCallback {
    fn on_poll(&self, _attempt: u32, _task: &RemoteActionTask, _elapsed: Duration) {}
}

/// Waits for remote tasks to reach a terminal status.
pub struct ActionPoller<'a> {
    clock: &'a dyn Clock,
    config: PollConfig,
    callback: Option<&'a dyn PollCallback>,
}

impl<'a> ActionPoller<'a> {
    pub fn new(clock: &'a dyn Clock, config: PollConfig) -> Self {
        Self {
            clock,
            config: config.clamped(),
            callback: None,
        }
    }

    /// Report every poll to `callback`.
    pub fn with_callback(mut self, callback: &'a dyn PollCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Wait for `task` to finish, reading its status with `read_status`.
    ///
    /// The first read happens one interval after the call. A tick that
    /// would land after the deadline is not taken: the wait ends at the
    /// deadline with [`PollOutcome::TimedOut`]. Transient read failures
    /// are logged and retried on the next tick; any other read failure
    /// ends the wait with that error.
    pub fn wait<F>(&self, task: RemoteActionTask, mut read_status: F) -> Result<PollOutcome>
    where
        F: FnMut(&str) -> Result<RemoteActionTask>,
    {
        let start = self.clock.now();
        let deadline = start + self.config.deadline;
        let mut latest = task;
        let mut attempt: u32 = 0;

        if latest.status.is_terminal() {
            return Ok(Self::terminal(latest));
        }

        loop {
            let next_tick = start + self.config.interval * (attempt + 1);
            if next_tick > deadline {
                let now = self.clock.now();
                if deadline > now {
                    self.clock.sleep(deadline - now);
                }
                let waited = self.clock.now().saturating_duration_since(start);
                log::info!(
                    "Stopped waiting for task {} after {}s (last status: {})",
                    latest.task_id,
                    waited.as_secs(),
                    latest.status
                );
                return Ok(PollOutcome::TimedOut {
                    task: latest,
                    waited,
                });
            }

            let now = self.clock.now();
            if next_tick > now {
                self.clock.sleep(next_tick - now);
            }
            attempt += 1;

            match read_status(&latest.task_id) {
                Ok(task) => {
                    log::debug!("Task {} is {} (poll {})", task.task_id, task.status, attempt);
                    latest = task;
                }
                Err(e) if e.is_retryable() => {
                    log::warn!(
                        "Poll {} for task {} failed, retrying: {}",
                        attempt,
                        latest.task_id,
                        e
                    );
                }
                Err(e) => return Err(e),
            }

            if let Some(cb) = self.callback {
                cb.on_poll(attempt, &latest, self.clock.now().saturating_duration_since(start));
            }

            if latest.status.is_terminal() {
                return Ok(Self::terminal(latest));
            }
        }
    }

    fn terminal(task: RemoteActionTask) -> PollOutcome {
        match task.status {
            TaskStatus::Failed => PollOutcome::Failed(task),
            _ => PollOutcome::Completed(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn task(status: TaskStatus) -> RemoteActionTask {
        RemoteActionTask {
            task_id: "task-1".to_string(),
            target_resource_id: "dev-1".to_string(),
            status,
            created_at: Utc::now(),
            message: None,
        }
    }

    #[test]
    fn test_completes_on_second_poll_at_deadline() {
        let clock = ManualClock::new();
        let poller = ActionPoller::new(
            &clock,
            PollConfig::new(Duration::from_secs(5), Duration::from_secs(10)),
        );
        let polls = Cell::new(0);

        let outcome = poller
            .wait(task(TaskStatus::Pending), |_| {
                polls.set(polls.get() + 1);
                if polls.get() == 2 {
                    Ok(task(TaskStatus::Completed))
                } else {
                    Ok(task(TaskStatus::Running))
                }
            })
            .unwrap();

        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(polls.get(), 2);
        assert_eq!(clock.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn test_times_out_before_first_tick() {
        let clock = ManualClock::new();
        let poller = ActionPoller::new(
            &clock,
            PollConfig::new(Duration::from_secs(5), Duration::from_secs(3)),
        );
        let polls = Cell::new(0);

        let outcome = poller
            .wait(task(TaskStatus::Pending), |_| {
                polls.set(polls.get() + 1);
                Ok(task(TaskStatus::Running))
            })
            .unwrap();

        match outcome {
            PollOutcome::TimedOut { waited, .. } => assert_eq!(waited, Duration::from_secs(3)),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(polls.get(), 0);
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_interval_is_raised() {
        assert_eq!(
            PollConfig::new(Duration::ZERO, Duration::from_secs(3)).interval,
            MIN_POLL_INTERVAL
        );

        let clock = ManualClock::new();
        let config = PollConfig {
            interval: Duration::ZERO,
            deadline: Duration::from_secs(3),
        };
        let poller = ActionPoller::new(&clock, config);
        let polls = Cell::new(0);

        let outcome = poller
            .wait(task(TaskStatus::Pending), |_| {
                polls.set(polls.get() + 1);
                Ok(task(TaskStatus::Running))
            })
            .unwrap();

        assert!(matches!(outcome, PollOutcome::TimedOut { .. }));
        assert_eq!(polls.get(), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_never_exceeds_deadline_plus_interval() {
        for (interval, deadline) in [(5, 12), (5, 15), (1, 7), (30, 10), (4, 4)] {
            let clock = ManualClock::new();
            let config =
                PollConfig::new(Duration::from_secs(interval), Duration::from_secs(deadline));
            let poller = ActionPoller::new(&clock, config);
            let outcome = poller
                .wait(task(TaskStatus::Pending), |_| Ok(task(TaskStatus::Running)))
                .unwrap();
            assert!(matches!(outcome, PollOutcome::TimedOut { .. }));
            assert!(clock.elapsed() <= config.deadline + config.interval);
        }
    }

    #[test]
    fn test_failed_status_is_terminal() {
        let clock = ManualClock::new();
        let poller = ActionPoller::new(&clock, PollConfig::default());
        let outcome = poller
            .wait(task(TaskStatus::Running), |_| {
                let mut t = task(TaskStatus::Failed);
                t.message = Some("device offline".to_string());
                Ok(t)
            })
            .unwrap();

        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, Error::ActionFailed { ref message, .. } if message == "device offline"));
        assert_eq!(clock.elapsed(), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_transient_read_errors_are_retried() {
        let clock = ManualClock::new();
        let poller = ActionPoller::new(
            &clock,
            PollConfig::new(Duration::from_secs(5), Duration::from_secs(60)),
        );
        let polls = Cell::new(0);

        let outcome = poller
            .wait(task(TaskStatus::Pending), |_| {
                polls.set(polls.get() + 1);
                if polls.get() < 3 {
                    Err(Error::Transient {
                        message: "503".to_string(),
                        status: Some(503),
                    })
                } else {
                    Ok(task(TaskStatus::Completed))
                }
            })
            .unwrap();

        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(clock.elapsed(), Duration::from_secs(15));
    }

    #[test]
    fn test_fatal_read_error_aborts() {
        let clock = ManualClock::new();
        let poller = ActionPoller::new(&clock, PollConfig::default());
        let result = poller.wait(task(TaskStatus::Pending), |_| {
            Err(Error::Fatal {
                message: "forbidden".to_string(),
                status: Some(403),
            })
        });
        assert!(matches!(result, Err(Error::Fatal { .. })));
    }

    #[test]
    fn test_already_terminal_returns_without_polling() {
        let clock = ManualClock::new();
        let poller = ActionPoller::new(&clock, PollConfig::default());
        let outcome = poller
            .wait(task(TaskStatus::Completed), |_| -> Result<RemoteActionTask> {
                panic!("should not poll")
            })
            .unwrap();
        assert!(matches!(outcome, PollOutcome::Completed(_)));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_timeout_into_result() {
        let outcome = PollOutcome::TimedOut {
            task: task(TaskStatus::Running),
            waited: Duration::from_secs(3),
        };
        assert!(matches!(
            outcome.into_result(),
            Err(Error::TimedOut { .. })
        ));
    }

    #[test]
    fn test_callback_invoked() {
        struct CountingCallback(AtomicU32);
        impl PollCallback for CountingCallback {
            fn on_poll(&self, _: u32, _: &RemoteActionTask, _: Duration) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let clock = ManualClock::new();
        let callback = CountingCallback(AtomicU32::new(0));
        let poller = ActionPoller::new(
            &clock,
            PollConfig::new(Duration::from_secs(1), Duration::from_secs(3)),
        )
        .with_callback(&callback);

        let _ = poller.wait(task(TaskStatus::Pending), |_| Ok(task(TaskStatus::Running)));
        assert_eq!(callback.0.load(Ordering::SeqCst), 3);
    }
}
