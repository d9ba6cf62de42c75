//! Bounded waiting for cloud resources

use std::thread;
use std::time::{Duration, Instant};

use crate::application::{ApplicationError, ApplicationResult, Ui};

/// How often to look, and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polling {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Polling {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Refresh `current` until `ready` says so, printing a dot per attempt.
    ///
    /// `ready` returns an error for terminal states; running out of time is fatal.
    pub fn wait_until<T>(
        &self,
        ui: &Ui,
        what: &str,
        mut current: T,
        ready: impl Fn(&T) -> ApplicationResult<bool>,
        mut refresh: impl FnMut() -> ApplicationResult<T>,
    ) -> ApplicationResult<T> {
        let started = Instant::now();
        loop {
            if ready(&current)? {
                return Ok(current);
            }
            if started.elapsed() >= self.timeout {
                ui.say("");
                return Err(ApplicationError::fatal(format!(
                    "Timed out after {}s waiting for {}",
                    self.timeout.as_secs(),
                    what
                )));
            }
            ui.print(".");
            thread::sleep(self.interval);
            current = refresh()?;
        }
    }
}
