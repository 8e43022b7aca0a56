//! Domain layer for the autoreply worker
//!
//! This module contains core domain models, errors, and the port traits that
//! collaborators (chat platform, language model, storage) implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
