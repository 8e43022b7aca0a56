//! Liveness snapshot of the worker's background loops.

use serde::Serialize;

use crate::domain::models::SchedulingMode;

/// Liveness snapshot of the worker loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Configured scheduling mode.
    pub mode: SchedulingMode,
    /// Event loop consuming the queue.
    pub event_loop_running: bool,
    /// Timer scheduler feeding the queue.
    pub scheduler_running: bool,
    /// Standalone autonomous check loop.
    pub checker_running: bool,
    /// Standalone memory summary loop.
    pub memory_generator_running: bool,
    /// Events waiting in the queue.
    pub queue_depth: usize,
}

impl HealthReport {
    /// True when every loop the scheduling mode requires is running.
    pub fn is_ready(&self) -> bool {
        let events_ready = !self.mode.uses_events() || (self.event_loop_running && self.scheduler_running);
        let periodic_ready =
            !self.mode.uses_periodic() || (self.checker_running && self.memory_generator_running);
        events_ready && periodic_ready
    }
}
