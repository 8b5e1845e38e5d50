#![cfg_attr(not(any(feature = "user", test)), no_std)]

pub mod counter_key;

pub use counter_key::RawCounterKey;

/// Width of `task_struct::comm`, including the NUL terminator
pub const TASK_COMM_LEN: usize = 16;

/// Program attached to `PERF_COUNT_HW_INSTRUCTIONS`
pub const INSTRUCTIONS_PROGRAM: &str = "on_instructions";
/// Counter map written by `INSTRUCTIONS_PROGRAM`
pub const INSTRUCTIONS_MAP: &str = "INSTRUCTION_COUNT";

/// Program attached to `PERF_COUNT_HW_CACHE_MISSES`
pub const CACHE_MISSES_PROGRAM: &str = "on_cache_miss";
/// Counter map written by `CACHE_MISSES_PROGRAM`
pub const CACHE_MISSES_MAP: &str = "MISS_COUNT";

/// Max entries of the kernel counter maps
pub const COUNTER_MAP_ENTRIES: u32 = 10240;
