//! The exit-time summary printed by the lifecycle controller.

use core::ffi::c_void;
use core::fmt::{Display, Formatter, Result as FmtResult};

use crate::config::{CMDLINE_LIMIT, LOG_PREFIX};
use crate::track::TraceRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    command_line: String,
    outstanding: isize,
    allocations: Vec<TraceRecord>,
    frees: Vec<TraceRecord>,
}

impl Report {
    pub fn new(
        command_line: String,
        outstanding: isize,
        allocations: Vec<TraceRecord>,
        frees: Vec<TraceRecord>,
    ) -> Self {
        Self {
            command_line,
            outstanding,
            allocations,
            frees,
        }
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn outstanding(&self) -> isize {
        self.outstanding
    }

    pub fn allocations(&self) -> &[TraceRecord] {
        &self.allocations
    }

    pub fn frees(&self) -> &[TraceRecord] {
        &self.frees
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "{LOG_PREFIX} alloc statistic [{}] ok", self.command_line)?;
        writeln!(f, "{LOG_PREFIX} alloc buf not free block: {}", self.outstanding)?;
        write_section(f, "alloc info", &self.allocations)?;
        write_section(f, "free info", &self.frees)
    }
}

fn write_section(f: &mut Formatter<'_>, title: &str, records: &[TraceRecord]) -> FmtResult {
    writeln!(f, "{LOG_PREFIX} ---- {title} ----")?;
    for record in records {
        writeln!(f, "{LOG_PREFIX} \tcall times: {}", record.hits)?;
        for frame in record.fingerprint.frames() {
            writeln!(f, "{LOG_PREFIX} \t\t{}", ResolvedFrame(*frame))?;
        }
    }
    Ok(())
}

/// A return address, printed as `symbol (file:line) [addr]` or `?? [addr]`
/// when it cannot be symbolised.
pub struct ResolvedFrame(pub usize);

impl Display for ResolvedFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut name = None;
        let mut location = None;
        backtrace::resolve(self.0 as *mut c_void, |symbol| {
            if name.is_some() {
                return;
            }
            name = symbol.name().map(|name| name.to_string());
            location = symbol
                .filename()
                .zip(symbol.lineno())
                .map(|(file, line)| format!("{}:{}", file.display(), line));
        });

        match (name, location) {
            (Some(name), Some(location)) => write!(f, "{name} ({location}) [{:#x}]", self.0),
            (Some(name), None) => write!(f, "{name} [{:#x}]", self.0),
            (None, _) => write!(f, "?? [{:#x}]", self.0),
        }
    }
}

/// Best-effort command line of the current process, at most
/// [`CMDLINE_LIMIT`] bytes, arguments separated by spaces.
pub fn read_cmdline() -> String {
    #[cfg(target_os = "linux")]
    {
        use std::fs::File;
        use std::io::Read;

        let mut buf = [0u8; CMDLINE_LIMIT];
        let read = File::open("/proc/self/cmdline").and_then(|mut file| file.read(&mut buf));
        match read {
            Ok(len) => normalize_cmdline(&buf[..len]),
            Err(err) => {
                tracing::debug!("cannot read command line: {err}");
                String::new()
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        String::new()
    }
}

fn normalize_cmdline(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
    let raw = &raw[..raw.len().min(CMDLINE_LIMIT)];
    String::from_utf8_lossy(raw).replace('\0', " ")
}
