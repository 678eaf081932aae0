//! Bounded automatic restarts.

use std::time::Duration;

/// What to do after the engine crashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Start the engine again after `after`.
    Retry { attempt: u32, after: Duration },
    /// Stop trying; the engine stays down until started explicitly.
    GiveUp { attempts: u32 },
}

/// Counts consecutive restart attempts and decides when to give up.
///
/// The counter grows by one for every restart that is scheduled and drops
/// back to zero once the engine completes its handshake.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    max_restarts: u32,
    backoff: Duration,
    attempts: u32,
    gave_up: bool,
}

impl RestartPolicy {
    pub fn new(max_restarts: u32, backoff: Duration) -> Self {
        Self {
            max_restarts,
            backoff,
            attempts: 0,
            gave_up: false,
        }
    }

    /// Record a crash and decide whether to restart.
    pub fn on_crash(&mut self) -> RestartDecision {
        if !self.gave_up && self.attempts < self.max_restarts {
            self.attempts += 1;
            RestartDecision::Retry {
                attempt: self.attempts,
                after: self.backoff,
            }
        } else {
            self.gave_up = true;
            RestartDecision::GiveUp {
                attempts: self.attempts,
            }
        }
    }

    /// The engine reached `Ready`.
    pub fn on_ready(&mut self) {
        self.attempts = 0;
    }

    /// Forget all history, e.g. after an explicit start or stop.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.gave_up = false;
    }

    /// Restart attempts since the engine was last ready.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    /// Whether restarts are exhausted.
    pub fn gave_up(&self) -> bool {
        self.gave_up
    }
}
