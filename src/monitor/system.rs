//! Live host statistics
//!
//! sysinfo covers the process list, the CPU list with current frequencies
//! and memory. CPU times and counters come from `/proc/stat`, read once per
//! sample, frequency bounds from sysfs and swap traffic from `/proc/vmstat`,
//! so those parts are Linux-only.

use super::sampler::{HostStats, SampleResult};
use super::snapshot::{CpuFreq, CpuStats, CpuTimes, SwapMemory, VirtualMemory};
use crate::error::SamplingError;
use sysinfo::{CpuRefreshKind, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

/// CPU times and counters taken from one read of `/proc/stat`
struct CpuSample {
    total: CpuTimes,
    per_cpu: Vec<CpuTimes>,
    stats: CpuStats,
}

pub struct SystemStats {
    sys: System,
    cpu: Option<CpuSample>,
}

impl SystemStats {
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_frequency()),
        );
        Self { sys, cpu: None }
    }

    fn cpu_sample(&mut self) -> SampleResult<&CpuSample> {
        let sample = match self.cpu.take() {
            Some(sample) => sample,
            None => platform::read_cpu()?,
        };
        Ok(&*self.cpu.insert(sample))
    }
}

impl Default for SystemStats {
    fn default() -> Self {
        Self::new()
    }
}

impl HostStats for SystemStats {
    fn refresh(&mut self) -> SampleResult<()> {
        self.cpu = None;
        Ok(())
    }

    fn pids(&mut self) -> SampleResult<Vec<u32>> {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );
        let mut pids: Vec<u32> = self.sys.processes().keys().map(|pid| pid.as_u32()).collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn cpu_count(&mut self) -> SampleResult<usize> {
        match self.sys.cpus().len() {
            0 => Err(SamplingError::Unsupported("cpu count")),
            count => Ok(count),
        }
    }

    fn cpu_freq(&mut self) -> SampleResult<CpuFreq> {
        let per_cpu = self.cpu_freq_per_cpu()?;
        let count = per_cpu.len() as f64;
        let sum = per_cpu.iter().fold((0.0, 0.0, 0.0), |acc, freq| {
            (acc.0 + freq.current, acc.1 + freq.min, acc.2 + freq.max)
        });
        Ok(CpuFreq {
            current: sum.0 / count,
            min: sum.1 / count,
            max: sum.2 / count,
        })
    }

    fn cpu_freq_per_cpu(&mut self) -> SampleResult<Vec<CpuFreq>> {
        self.sys.refresh_cpu_frequency();
        let cpus = self.sys.cpus();
        if cpus.is_empty() {
            return Err(SamplingError::Unsupported("cpu frequency"));
        }

        Ok(cpus
            .iter()
            .enumerate()
            .map(|(index, cpu)| {
                let (min, max) = frequency_bounds(index);
                CpuFreq {
                    current: cpu.frequency() as f64,
                    min,
                    max,
                }
            })
            .collect())
    }

    fn cpu_times(&mut self) -> SampleResult<CpuTimes> {
        Ok(self.cpu_sample()?.total.clone())
    }

    fn cpu_times_per_cpu(&mut self) -> SampleResult<Vec<CpuTimes>> {
        Ok(self.cpu_sample()?.per_cpu.clone())
    }

    fn cpu_stats(&mut self) -> SampleResult<CpuStats> {
        Ok(self.cpu_sample()?.stats.clone())
    }

    fn virtual_memory(&mut self) -> SampleResult<VirtualMemory> {
        self.sys.refresh_memory();
        Ok(VirtualMemory {
            total: self.sys.total_memory(),
            available: self.sys.available_memory(),
            used: self.sys.used_memory(),
            free: self.sys.free_memory(),
        })
    }

    fn swap_memory(&mut self) -> SampleResult<SwapMemory> {
        self.sys.refresh_memory();
        let total = self.sys.total_swap();
        let used = self.sys.used_swap();
        let percent = if total > 0 {
            (used as f64 / total as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        let (sin, sout) = platform::swap_traffic()?;

        Ok(SwapMemory {
            total,
            used,
            free: self.sys.free_swap(),
            percent,
            sin,
            sout,
        })
    }
}

/// Scaling bounds of one CPU in MHz, `0.0` when the kernel doesn't expose them
fn frequency_bounds(index: usize) -> (f64, f64) {
    #[cfg(target_os = "linux")]
    {
        let read_khz = |name: &str| -> f64 {
            let path = format!("/sys/devices/system/cpu/cpu{}/cpufreq/{}", index, name);
            std::fs::read_to_string(path)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .map(|khz| khz / 1000.0)
                .unwrap_or(0.0)
        };
        (read_khz("scaling_min_freq"), read_khz("scaling_max_freq"))
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = index;
        (0.0, 0.0)
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use super::CpuSample;
    use crate::error::SamplingError;
    use crate::monitor::sampler::SampleResult;
    use crate::monitor::snapshot::{CpuStats, CpuTimes};
    use procfs::{CpuTime, FromBufReadSI, KernelStats};

    fn to_times(cpu: &CpuTime) -> CpuTimes {
        CpuTimes {
            user: cpu.user_ms() as f64 / 1000.0,
            system: cpu.system_ms() as f64 / 1000.0,
            idle: cpu.idle_ms() as f64 / 1000.0,
        }
    }

    pub(super) fn read_cpu() -> SampleResult<CpuSample> {
        let contents = std::fs::read_to_string("/proc/stat")?;
        parse_stat(&contents)
    }

    /// Times and counters from `/proc/stat` contents. KernelStats has no
    /// field for the `intr` and `softirq` totals, so those are read directly.
    pub(super) fn parse_stat(contents: &str) -> SampleResult<CpuSample> {
        let kernel = KernelStats::from_buf_read(contents.as_bytes(), procfs::current_system_info())?;

        Ok(CpuSample {
            total: to_times(&kernel.total),
            per_cpu: kernel.cpu_time.iter().map(to_times).collect(),
            stats: CpuStats {
                ctx_switches: kernel.ctxt,
                interrupts: first_counter(contents, "intr")?,
                soft_interrupts: first_counter(contents, "softirq")?,
                // Linux has no system-wide syscall counter
                syscalls: 0,
            },
        })
    }

    /// Pages swapped in and out since boot, converted to bytes
    pub(super) fn swap_traffic() -> SampleResult<(u64, u64)> {
        let vmstat = procfs::vmstat()?;
        let page_size = procfs::page_size();
        let bytes = |key: &str| vmstat.get(key).copied().unwrap_or(0).max(0) as u64 * page_size;
        Ok((bytes("pswpin"), bytes("pswpout")))
    }

    /// First number on the `/proc/stat` line starting with `key` (the total)
    pub(super) fn first_counter(contents: &str, key: &str) -> SampleResult<u64> {
        let line = contents
            .lines()
            .find(|line| line.split_whitespace().next() == Some(key))
            .ok_or_else(|| SamplingError::Malformed(format!("no {} line in /proc/stat", key)))?;
        let value = line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| SamplingError::Malformed(format!("empty {} line in /proc/stat", key)))?;
        value
            .parse()
            .map_err(|_| SamplingError::Malformed(format!("bad {} value: {}", key, value)))
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use super::CpuSample;
    use crate::error::SamplingError;
    use crate::monitor::sampler::SampleResult;

    pub(super) fn read_cpu() -> SampleResult<CpuSample> {
        Err(SamplingError::Unsupported("cpu times"))
    }

    pub(super) fn swap_traffic() -> SampleResult<(u64, u64)> {
        Ok((0, 0))
    }
}
