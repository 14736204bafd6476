//! The real allocator the tracer forwards to.

use core::ffi::c_void;
use libc::size_t;

#[cfg(feature = "preload")]
extern "C" {
    fn __libc_malloc(size: size_t) -> *mut c_void;
    fn __libc_free(ptr: *mut c_void);
    fn __libc_calloc(count: size_t, size: size_t) -> *mut c_void;
    fn __libc_realloc(ptr: *mut c_void, size: size_t) -> *mut c_void;
}

/// The four C allocation primitives.
///
/// # Safety
///
/// Implementations must honour the C allocation contract: pointers returned
/// by one method may be passed to `free`/`realloc` of the same allocator,
/// `free(null)` is a no-op, and failure is reported as a null return.
pub unsafe trait RawAllocator {
    unsafe fn malloc(&self, size: size_t) -> *mut c_void;
    unsafe fn free(&self, ptr: *mut c_void);
    unsafe fn calloc(&self, count: size_t, size: size_t) -> *mut c_void;
    unsafe fn realloc(&self, ptr: *mut c_void, size: size_t) -> *mut c_void;
}

/// The C library allocator.
///
/// With `preload` on, the crate exports its own `malloc` and friends, so this
/// goes through glibc's internal entry points to avoid calling back into the
/// hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Libc;

#[cfg(feature = "preload")]
unsafe impl RawAllocator for Libc {
    unsafe fn malloc(&self, size: size_t) -> *mut c_void {
        __libc_malloc(size)
    }

    unsafe fn free(&self, ptr: *mut c_void) {
        __libc_free(ptr)
    }

    unsafe fn calloc(&self, count: size_t, size: size_t) -> *mut c_void {
        __libc_calloc(count, size)
    }

    unsafe fn realloc(&self, ptr: *mut c_void, size: size_t) -> *mut c_void {
        __libc_realloc(ptr, size)
    }
}

#[cfg(not(feature = "preload"))]
unsafe impl RawAllocator for Libc {
    unsafe fn malloc(&self, size: size_t) -> *mut c_void {
        libc::malloc(size)
    }

    unsafe fn free(&self, ptr: *mut c_void) {
        libc::free(ptr)
    }

    unsafe fn calloc(&self, count: size_t, size: size_t) -> *mut c_void {
        libc::calloc(count, size)
    }

    unsafe fn realloc(&self, ptr: *mut c_void, size: size_t) -> *mut c_void {
        libc::realloc(ptr, size)
    }
}
