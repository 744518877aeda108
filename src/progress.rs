//! Spinner shown while waiting on remote tasks

use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{PollCallback, RemoteActionTask};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Spinner driven by [`PollCallback`] ticks.
///
/// Created on the first poll and cleared once the task reaches a terminal
/// status, so waits that never start print nothing.
#[derive(Default)]
pub struct TaskSpinner {
    bar: Mutex<Option<ProgressBar>>,
}

impl TaskSpinner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        match self.bar.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn spinner() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("    {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }

    /// Clear the spinner if one is showing
    pub fn finish(&self) {
        if let Some(bar) = self.lock().take() {
            bar.finish_and_clear();
        }
    }
}

/// Spinner message for a task status
pub fn message(task: &RemoteActionTask, elapsed: Duration) -> String {
    format!(
        "Task {} is {} ({}s)",
        task.task_id,
        task.status,
        elapsed.as_secs()
    )
}

impl PollCallback for TaskSpinner {
    fn on_poll(&self, _attempt: u32, task: &RemoteActionTask, elapsed: Duration) {
        let mut bar = self.lock();
        if task.status.is_terminal() {
            if let Some(bar) = bar.take() {
                bar.finish_and_clear();
            }
            return;
        }
        bar.get_or_insert_with(Self::spinner)
            .set_message(message(task, elapsed));
    }
}
