//! Autoreply - autonomous chat responder
//!
//! A worker that watches workplace chat channels and decides, per
//! conversation scope, whether to speak up. Work flows through a coalescing
//! event queue fed by a multi-interval scheduler and by inbound messages;
//! decisions are memoized in a confidence-weighted judgment cache.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): scheduling core and use cases
//! - **Adapters** (`adapters`): SQLite, Slack, Anthropic and in-process mocks
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **Application Layer** (`application`): the `Worker` composition root
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use application::Worker;
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Config, Event, EventType, IncomingMessage, SchedulingMode};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{EventDispatcher, EventLoop, EventQueue, EventScheduler};
