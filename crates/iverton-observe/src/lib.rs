//! Observability for Iverton: tracing subscriber setup.

pub mod tracing_setup;
