//! C allocation entry points and the process lifecycle controller.
//!
//! With the `preload` feature these are exported under their C names and the
//! controller runs from the ELF constructor and destructor tables, so loading
//! the library with `LD_PRELOAD` traces the whole program and prints the
//! report to stderr when it exits.

use core::ffi::c_void;
use core::fmt::Write;
use libc::size_t;
use tracing::{debug, error};

use crate::globals::TRACER;
use crate::logger::{init_logging, LowLevelWriter};

#[cfg_attr(feature = "preload", no_mangle)]
pub unsafe extern "C" fn malloc(size: size_t) -> *mut c_void {
    TRACER.allocate(size)
}

#[cfg_attr(feature = "preload", no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    TRACER.deallocate(ptr)
}

#[cfg_attr(feature = "preload", no_mangle)]
pub unsafe extern "C" fn calloc(count: size_t, size: size_t) -> *mut c_void {
    TRACER.allocate_zeroed(count, size)
}

#[cfg_attr(feature = "preload", no_mangle)]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: size_t) -> *mut c_void {
    TRACER.resize(ptr, size)
}

/// Lifecycle entry: installs the logger and switches tracing on.
pub extern "C" fn alloc_hook_init() {
    init_logging();
    if !TRACER.start() {
        debug!("tracer already started");
    }
}

/// Lifecycle exit: switches tracing off and writes the report to stderr.
pub extern "C" fn alloc_hook_fini() {
    let Some(report) = TRACER.finish() else {
        debug!("tracer was not active, no report");
        return;
    };

    if write!(LowLevelWriter::stderr(), "{report}").is_err() {
        error!("failed to write allocation report");
    }
}

#[cfg(all(feature = "preload", target_os = "linux"))]
#[used]
#[link_section = ".init_array"]
static INIT: extern "C" fn() = alloc_hook_init;

#[cfg(all(feature = "preload", target_os = "linux"))]
#[used]
#[link_section = ".fini_array"]
static FINI: extern "C" fn() = alloc_hook_fini;
