//! 進捗報告
//!
//! Observers only: a monitor never influences control flow or results.

use tracing::{debug, info};

pub trait ProgressMonitor {
    fn task_started(&mut self, message: &str);
    fn progress_changed(&mut self, done: usize, total: usize);
    fn task_stopped(&mut self);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressMonitor;

impl ProgressMonitor for NoopProgressMonitor {
    fn task_started(&mut self, _message: &str) {}
    fn progress_changed(&mut self, _done: usize, _total: usize) {}
    fn task_stopped(&mut self) {}
}

/// Logs through `tracing`, throttled to one progress event every `log_every` steps
#[derive(Debug, Clone)]
pub struct TracingProgressMonitor {
    log_every: usize,
    current_task: Option<String>,
}

impl TracingProgressMonitor {
    pub fn new(log_every: usize) -> Self {
        Self {
            log_every,
            current_task: None,
        }
    }
}

impl ProgressMonitor for TracingProgressMonitor {
    fn task_started(&mut self, message: &str) {
        info!("{}", message);
        self.current_task = Some(message.to_string());
    }

    fn progress_changed(&mut self, done: usize, total: usize) {
        if self.log_every == 0 || done % self.log_every != 0 {
            return;
        }
        let task = self.current_task.as_deref().unwrap_or("realization");
        debug!("{}: {}/{}", task, done, total);
    }

    fn task_stopped(&mut self) {
        if let Some(task) = self.current_task.take() {
            info!("{}: done", task);
        }
    }
}
