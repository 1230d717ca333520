//! Observability setup for Mnemo.

pub mod tracing_setup;
