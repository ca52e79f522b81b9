//! psrun: run a command under supervision
//!
//! The child's stdout and stderr are relayed line by line to log sinks while
//! it runs, a snapshot of host statistics is taken once per poll interval,
//! and an optional timeout stops the child with a terminate-then-kill
//! escalation.

pub mod config;
pub mod core;
pub mod error;
pub mod monitor;
pub mod reporter;
pub mod sink;

// Re-export the main types for use in tests and binaries
pub use config::{SupervisorConfig, SupervisorConfigBuilder};
pub use crate::core::{ProcessSupervisor, RunResult};
pub use error::{Result, RunError, SamplingError};
pub use monitor::{MonitorSampler, Snapshot};
pub use reporter::{run, run_with};
pub use sink::{build_sink, LogSink, MemorySink, RunSinks, SinkTarget};
