use crate::raw::Libc;
use crate::tracer::Tracer;

/// The tracer behind the exported allocation hooks. Built at compile time so
/// it exists before the first `malloc` of the process.
pub static TRACER: Tracer<Libc> = Tracer::new(Libc);
