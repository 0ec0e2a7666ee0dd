//! Shared tracing setup for MindGraph services.

mod init;

pub use init::{init_tracing, init_tracing_for, TracingConfig};
