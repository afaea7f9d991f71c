use std::time::{Duration, Instant};

/// A cancellable, single-shot delayed notification.
///
/// Each `schedule` supersedes whatever was pending, so only the most
/// recently scheduled run can ever fire. The owner drives it from its event
/// loop: [`DelayedTask::deadline`] tells the loop how long it may sleep,
/// [`DelayedTask::poll`] fires the task once its deadline has passed.
#[derive(Debug)]
pub struct DelayedTask {
    /// Delay applied by `schedule`
    delay: Duration,

    /// Deadline of the pending run
    pending: Option<Instant>,
}

impl DelayedTask {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Schedule a run `delay` after `now`, replacing any pending run
    pub fn schedule(&mut self, now: Instant) {
        self.pending = Some(now + self.delay);
    }

    /// Drop the pending run, if any
    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            log::trace!("Cancelled delayed task");
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    /// Consume the pending run if its deadline has passed.
    ///
    /// Returns true when the run fired; a run fires at most once.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(deadline) if now >= deadline => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}
