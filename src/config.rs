use tracing_subscriber::filter::LevelFilter;

/// Distinct call stacks each trace store can hold before it starts dropping.
pub const TRACE_CAPACITY: usize = 2048;

/// Return addresses kept per call stack, innermost first.
pub const TRACE_DEPTH: usize = 8;

/// Bytes of `/proc/self/cmdline` echoed in the report header.
pub const CMDLINE_LIMIT: usize = 128;

pub const LOG_PREFIX: &str = "[alloc hook]";

pub const LOG_LEVEL: LevelFilter = LevelFilter::WARN;
