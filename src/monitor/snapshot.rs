//! Snapshot records emitted once per tick

use serde::Serialize;

/// CPU frequency in MHz
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CpuFreq {
    pub current: f64,
    pub min: f64,
    pub max: f64,
}

/// Cumulative CPU time in seconds
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
}

/// Cumulative CPU event counters since boot
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CpuStats {
    pub ctx_switches: u64,
    pub interrupts: u64,
    pub soft_interrupts: u64,
    pub syscalls: u64,
}

/// Physical memory in bytes
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VirtualMemory {
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub free: u64,
}

/// Swap usage in bytes, plus bytes swapped in/out since boot
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SwapMemory {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
    pub sin: u64,
    pub sout: u64,
}

/// Host statistics captured while supervising `pid`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    pub pid: u32,
    pub all_pids: Vec<u32>,
    pub cpu_count: usize,
    pub cpu_freq: CpuFreq,
    pub cpu_freq_per_cpu: Vec<CpuFreq>,
    pub cpu_times: CpuTimes,
    pub cpu_times_per_cpu: Vec<CpuTimes>,
    pub cpu_stats: CpuStats,
    pub virtual_memory: VirtualMemory,
    /// Always `None` in emitted snapshots; see [`MonitorSampler`](super::MonitorSampler)
    pub swap_memory: Option<SwapMemory>,
}

/// Stand-in for a snapshot whose collection failed
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DegradedSnapshot {
    pub pid: u32,
    pub error: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Snapshot {
    Host(HostSnapshot),
    Degraded(DegradedSnapshot),
}

impl Snapshot {
    pub fn pid(&self) -> u32 {
        match self {
            Snapshot::Host(host) => host.pid,
            Snapshot::Degraded(degraded) => degraded.pid,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Snapshot::Degraded(_))
    }

    /// Serialize to a single JSON line with keys sorted at every level
    pub fn to_line(&self) -> serde_json::Result<String> {
        // serde_json's map is ordered by key, so the round trip through
        // `Value` sorts the struct fields
        let value = serde_json::to_value(self)?;
        serde_json::to_string(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_line_has_sorted_keys() {
        let snapshot = Snapshot::Degraded(DegradedSnapshot {
            pid: 10,
            error: "IoError: boom".to_string(),
        });

        assert_eq!(
            snapshot.to_line().unwrap(),
            r#"{"error":"IoError: boom","pid":10}"#
        );
        assert!(snapshot.is_degraded());
        assert_eq!(snapshot.pid(), 10);
    }

    #[test]
    fn test_nested_records_have_sorted_keys() {
        let freq = CpuFreq {
            current: 2400.0,
            min: 800.0,
            max: 3600.0,
        };
        let line = serde_json::to_string(&serde_json::to_value(&freq).unwrap()).unwrap();
        assert_eq!(line, r#"{"current":2400.0,"max":3600.0,"min":800.0}"#);
    }
}
