//! Scheduling core and use cases.

pub mod autonomous_response;
pub mod channel_sync;
pub mod event_dispatcher;
pub mod event_loop;
pub mod event_queue;
pub mod event_scheduler;
pub mod handlers;
pub mod health;
pub mod lifecycle;
pub mod memory_summary;
pub mod message_intake;
pub mod periodic_loop;
pub mod prompts;

#[cfg(test)]
pub(crate) mod test_support;

pub use autonomous_response::{AutonomousResponseConfig, AutonomousResponseService, CheckReport, ScopeOutcome};
pub use channel_sync::{ChannelSyncService, SyncReport};
pub use event_dispatcher::{DispatchReport, EventDispatcher, EventHandler};
pub use event_loop::{EventLoop, EventLoopConfig};
pub use event_queue::EventQueue;
pub use event_scheduler::{EventScheduler, SchedulerConfig};
pub use handlers::{AutonomousCheckHandler, ChannelSyncHandler, MessageHandler, SummaryHandler};
pub use health::HealthReport;
pub use lifecycle::{Lifecycle, LoopState, RunGuard};
pub use memory_summary::{MemorySummaryConfig, MemorySummaryService, SummaryReport};
pub use message_intake::MessageIntakeService;
pub use periodic_loop::{BackgroundMemoryGenerator, PeriodicChecker, PeriodicLoop, PeriodicTask};
