use core::fmt::{Debug, Write};
use core::sync::atomic::{AtomicBool, Ordering};
use libc::{c_int, write, STDERR_FILENO};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::config::{LOG_LEVEL, LOG_PREFIX};

// Writes one line per event without touching the heap, so it is safe to call
// from inside the allocation hooks.
struct NoAllocLogger;

impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for NoAllocLogger {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut writer = LowLevelWriter::stderr();

        let _ = write!(writer, "{LOG_PREFIX} {} ", event.metadata().level());

        event.record(&mut |_field: &tracing_core::Field, value: &dyn Debug| {
            let _ = write!(writer, "{:?}", value);
        });

        let _ = writeln!(writer);
    }
}

/// Direct low-level writer over a raw file descriptor using `libc::write`.
pub struct LowLevelWriter {
    fd: c_int,
}

impl LowLevelWriter {
    pub const fn new(fd: c_int) -> Self {
        Self { fd }
    }

    pub const fn stderr() -> Self {
        Self::new(STDERR_FILENO)
    }
}

impl Write for LowLevelWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            let written = unsafe { write(self.fd, bytes.as_ptr() as *const _, bytes.len()) };
            if written <= 0 {
                return Err(core::fmt::Error);
            }
            bytes = &bytes[written as usize..];
        }
        Ok(())
    }
}

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Installs the stderr logger as the global `tracing` subscriber. Only the
/// first call has any effect.
pub fn init_logging() {
    if LOGGING_INITIALIZED.swap(true, Ordering::AcqRel) {
        return;
    }

    let subscriber =
        tracing_subscriber::Registry::default().with(NoAllocLogger.with_filter(LOG_LEVEL));
    // Another subscriber may already be installed by the host; keep theirs.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
