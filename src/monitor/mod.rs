//! Host monitoring
//!
//! One snapshot of host CPU, memory and process-identity statistics is taken
//! per supervisor tick and written to the monitor sink as a JSON line.

pub mod sampler;
pub mod snapshot;
pub mod system;

pub use sampler::{HostStats, MonitorSampler, SampleResult};
pub use snapshot::{
    CpuFreq, CpuStats, CpuTimes, DegradedSnapshot, HostSnapshot, Snapshot, SwapMemory,
    VirtualMemory,
};
pub use system::SystemStats;
