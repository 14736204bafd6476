pub mod config;
pub mod globals;
pub mod guard;
pub mod hooks;
pub mod logger;
pub mod raw;
pub mod report;
pub mod stack;
pub mod track;
pub mod tracer;

#[cfg(feature = "preload")]
mod internal_alloc;

pub use guard::Phase;
pub use raw::{Libc, RawAllocator};
pub use report::Report;
pub use stack::Fingerprint;
pub use track::{CapacityExceeded, TraceRecord, TraceStore};
pub use tracer::Tracer;
