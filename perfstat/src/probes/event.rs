use std::fmt;
use std::str::FromStr;

use perfstat_common::{CACHE_MISSES_MAP, CACHE_MISSES_PROGRAM, INSTRUCTIONS_MAP, INSTRUCTIONS_PROGRAM};
use serde::{Deserialize, Serialize};

/// Performance counter a probe is attached to
#[derive(Eq, Hash, PartialEq, Serialize, Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    Instructions,
    CacheMisses,
    CacheReferences,
    CpuCycles,
    BranchInstructions,
    BranchMisses,
    TaskClock,
}

impl Event {
    pub const ALL: [Event; 7] = [
        Event::Instructions,
        Event::CacheMisses,
        Event::CacheReferences,
        Event::CpuCycles,
        Event::BranchInstructions,
        Event::BranchMisses,
        Event::TaskClock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Instructions => "instructions",
            Event::CacheMisses => "cache-misses",
            Event::CacheReferences => "cache-references",
            Event::CpuCycles => "cpu-cycles",
            Event::BranchInstructions => "branch-instructions",
            Event::BranchMisses => "branch-misses",
            Event::TaskClock => "task-clock",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Event::Instructions => "instructions retired",
            Event::CacheMisses => "last level cache misses",
            Event::CacheReferences => "last level cache accesses",
            Event::CpuCycles => "cpu cycles",
            Event::BranchInstructions => "branch instructions retired",
            Event::BranchMisses => "mispredicted branches",
            Event::TaskClock => "task clock (software)",
        }
    }

    /// Perf event program expected in the bpf object
    pub fn default_program(&self) -> &'static str {
        match self {
            Event::Instructions => INSTRUCTIONS_PROGRAM,
            Event::CacheMisses => CACHE_MISSES_PROGRAM,
            Event::CacheReferences => "on_cache_ref",
            Event::CpuCycles => "on_cpu_cycles",
            Event::BranchInstructions => "on_branch_instructions",
            Event::BranchMisses => "on_branch_misses",
            Event::TaskClock => "on_task_clock",
        }
    }

    /// Counter map written by `default_program`
    pub fn default_map(&self) -> &'static str {
        match self {
            Event::Instructions => INSTRUCTIONS_MAP,
            Event::CacheMisses => CACHE_MISSES_MAP,
            Event::CacheReferences => "REF_COUNT",
            Event::CpuCycles => "CYCLE_COUNT",
            Event::BranchInstructions => "BRANCH_COUNT",
            Event::BranchMisses => "BRANCH_MISS_COUNT",
            Event::TaskClock => "TASK_CLOCK_COUNT",
        }
    }
}

#[cfg(feature = "aya")]
impl Event {
    pub fn perf_type(&self) -> aya::programs::perf_event::PerfTypeId {
        use aya::programs::perf_event::PerfTypeId;
        match self {
            Event::TaskClock => PerfTypeId::Software,
            _ => PerfTypeId::Hardware,
        }
    }

    pub fn config(&self) -> u64 {
        use aya::programs::perf_event::{perf_hw_id, perf_sw_ids};
        match self {
            Event::Instructions => perf_hw_id::PERF_COUNT_HW_INSTRUCTIONS as u64,
            Event::CacheMisses => perf_hw_id::PERF_COUNT_HW_CACHE_MISSES as u64,
            Event::CacheReferences => perf_hw_id::PERF_COUNT_HW_CACHE_REFERENCES as u64,
            Event::CpuCycles => perf_hw_id::PERF_COUNT_HW_CPU_CYCLES as u64,
            Event::BranchInstructions => perf_hw_id::PERF_COUNT_HW_BRANCH_INSTRUCTIONS as u64,
            Event::BranchMisses => perf_hw_id::PERF_COUNT_HW_BRANCH_MISSES as u64,
            Event::TaskClock => perf_sw_ids::PERF_COUNT_SW_TASK_CLOCK as u64,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown event: {s}"))
    }
}
