//! Start/stop lifecycle shared by every background loop.
//!
//! A [`Lifecycle`] is a two-state machine (`Stopped` / `Running`) held in a
//! `tokio::sync::watch` channel so that loops can sleep on "state changed or
//! timeout elapsed". `begin` hands out a [`RunGuard`] for exactly one run at a
//! time; a second `begin` while running gets `None`.

use std::time::Duration;

use tokio::sync::watch;

/// Observable state of a background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No run in progress.
    Stopped,
    /// A run owns the lifecycle.
    Running,
}

#[derive(Debug, Clone, Copy)]
struct Phase {
    state: LoopState,
    /// Incremented on every successful `begin`, so a guard from an earlier
    /// run never mistakes a later run for its own.
    epoch: u64,
}

impl Phase {
    fn is_running(&self, epoch: u64) -> bool {
        self.state == LoopState::Running && self.epoch == epoch
    }
}

/// Idempotent start/stop state for one loop instance.
#[derive(Debug)]
pub struct Lifecycle {
    phase: watch::Sender<Phase>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// A stopped lifecycle.
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase {
            state: LoopState::Stopped,
            epoch: 0,
        });
        Self { phase }
    }

    /// Transition `Stopped -> Running`.
    ///
    /// Returns `None` when already running; the caller must not start a
    /// second execution.
    pub fn begin(&self) -> Option<RunGuard<'_>> {
        let mut epoch = 0;
        let started = self.phase.send_if_modified(|phase| {
            if phase.state == LoopState::Running {
                return false;
            }
            phase.state = LoopState::Running;
            phase.epoch += 1;
            epoch = phase.epoch;
            true
        });
        if !started {
            return None;
        }
        Some(RunGuard {
            lifecycle: self,
            epoch,
        })
    }

    /// Request `Running -> Stopped`. Does not wait for the loop to exit.
    ///
    /// Returns false if the loop was not running.
    pub fn request_stop(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if phase.state == LoopState::Stopped {
                return false;
            }
            phase.state = LoopState::Stopped;
            true
        })
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        self.phase.borrow().state
    }

    /// Shorthand for `state() == LoopState::Running`.
    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }
}

/// Proof that the holder owns the current run of a [`Lifecycle`].
///
/// Dropping the guard (loop exit, task abort, panic) puts the lifecycle back
/// to `Stopped` if this run is still the current one.
#[derive(Debug)]
pub struct RunGuard<'a> {
    lifecycle: &'a Lifecycle,
    epoch: u64,
}

impl RunGuard<'_> {
    /// True until a stop is requested for this run.
    pub fn is_active(&self) -> bool {
        self.lifecycle.phase.borrow().is_running(self.epoch)
    }

    /// Sleep until a stop is requested or `timeout` elapses.
    ///
    /// Returns true if the loop should exit.
    pub async fn wait_for_stop(&self, timeout: Duration) -> bool {
        let mut rx = self.lifecycle.phase.subscribe();
        let epoch = self.epoch;
        let stopped = tokio::time::timeout(timeout, rx.wait_for(|phase| !phase.is_running(epoch)))
            .await
            .is_ok();
        stopped
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let epoch = self.epoch;
        self.lifecycle.phase.send_if_modified(|phase| {
            if !phase.is_running(epoch) {
                return false;
            }
            phase.state = LoopState::Stopped;
            true
        });
    }
}
