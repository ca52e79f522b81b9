//! Core supervision engine
//!
//! This module contains the process supervisor, the stream relays feeding
//! it and the timing constants they share.

pub mod constants;
pub mod stream_relay;
pub mod supervisor;

// Re-export main types
pub use stream_relay::{start_relay, LineQueue};
pub use supervisor::{
    spawn, ChildState, ProcessSupervisor, RunResult, SpawnedChild, SupervisedChild,
};
