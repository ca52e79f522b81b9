//! Per-tick host sampling
//!
//! [`MonitorSampler`] asks a [`HostStats`] source for each part of a
//! snapshot. If any part fails, the whole snapshot is replaced by a
//! degraded `{pid, error}` record; sampling never fails a run.

use super::snapshot::{
    CpuFreq, CpuStats, CpuTimes, DegradedSnapshot, HostSnapshot, Snapshot, SwapMemory,
    VirtualMemory,
};
use super::system::SystemStats;
use crate::error::{Result, SamplingError};
use crate::sink::LogSink;
use log::debug;

pub type SampleResult<T> = std::result::Result<T, SamplingError>;

/// Source of host statistics
pub trait HostStats {
    /// Called once before each snapshot. Sources that read several fields
    /// from one file drop what they read for the previous snapshot here.
    fn refresh(&mut self) -> SampleResult<()> {
        Ok(())
    }
    /// Every live process id on the host, ascending
    fn pids(&mut self) -> SampleResult<Vec<u32>>;
    /// Number of logical CPUs
    fn cpu_count(&mut self) -> SampleResult<usize>;
    fn cpu_freq(&mut self) -> SampleResult<CpuFreq>;
    fn cpu_freq_per_cpu(&mut self) -> SampleResult<Vec<CpuFreq>>;
    fn cpu_times(&mut self) -> SampleResult<CpuTimes>;
    fn cpu_times_per_cpu(&mut self) -> SampleResult<Vec<CpuTimes>>;
    fn cpu_stats(&mut self) -> SampleResult<CpuStats>;
    fn virtual_memory(&mut self) -> SampleResult<VirtualMemory>;
    fn swap_memory(&mut self) -> SampleResult<SwapMemory>;
}

/// Captures one snapshot per call and writes it to a monitor sink
pub struct MonitorSampler {
    stats: Box<dyn HostStats>,
}

impl MonitorSampler {
    pub fn new(stats: Box<dyn HostStats>) -> Self {
        Self { stats }
    }

    /// Sampler backed by the live host
    pub fn system() -> Self {
        Self::new(Box::new(SystemStats::new()))
    }

    /// Capture a snapshot, degrading to `{pid, error}` on any failure
    pub fn sample(&mut self, pid: u32) -> Snapshot {
        match self.collect(pid) {
            Ok(host) => Snapshot::Host(host),
            Err(e) => {
                debug!("Sampling failed for pid {}: {}", pid, e);
                Snapshot::Degraded(DegradedSnapshot {
                    pid,
                    error: format!("{}: {}", e.kind(), e),
                })
            }
        }
    }

    /// Capture a snapshot and write it to `sink` as one line
    pub fn emit(&mut self, pid: u32, sink: &dyn LogSink) -> Result<()> {
        let line = self.sample(pid).to_line()?;
        sink.write_line(&line)?;
        Ok(())
    }

    fn collect(&mut self, pid: u32) -> SampleResult<HostSnapshot> {
        self.stats.refresh()?;
        let all_pids = self.stats.pids()?;
        let cpu_count = self.stats.cpu_count()?;
        let cpu_freq = self.stats.cpu_freq()?;
        let cpu_freq_per_cpu = self.stats.cpu_freq_per_cpu()?;
        let cpu_times = self.stats.cpu_times()?;
        let cpu_times_per_cpu = self.stats.cpu_times_per_cpu()?;
        let cpu_stats = self.stats.cpu_stats()?;
        let virtual_memory = self.stats.virtual_memory()?;

        // Swap is still collected, so its failures degrade the snapshot, but
        // the emitted field stays null. Downstream consumers rely on that.
        let _swap = self.stats.swap_memory()?;

        Ok(HostSnapshot {
            pid,
            all_pids,
            cpu_count,
            cpu_freq,
            cpu_freq_per_cpu,
            cpu_times,
            cpu_times_per_cpu,
            cpu_stats,
            virtual_memory,
            swap_memory: None,
        })
    }
}
