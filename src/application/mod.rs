//! Application layer: the worker composition root.

pub mod worker;

pub use worker::{Worker, DEFAULT_SHUTDOWN_GRACE};
