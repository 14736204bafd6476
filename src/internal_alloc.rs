use core::ffi::c_void;
use std::alloc::{GlobalAlloc, Layout};

use crate::raw::{Libc, RawAllocator};

// Alignment `malloc` already guarantees on the supported targets.
const MIN_ALIGN: usize = 16;

/// Keeps the shim's own Rust allocations off the exported hooks.
struct InternalAllocator;

unsafe impl GlobalAlloc for InternalAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= MIN_ALIGN {
            Libc.malloc(layout.size()) as *mut u8
        } else {
            aligned_alloc(layout)
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        Libc.free(ptr as *mut c_void);
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= MIN_ALIGN {
            Libc.calloc(1, layout.size()) as *mut u8
        } else {
            let ptr = aligned_alloc(layout);
            if !ptr.is_null() {
                core::ptr::write_bytes(ptr, 0, layout.size());
            }
            ptr
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() <= MIN_ALIGN {
            return Libc.realloc(ptr as *mut c_void, new_size) as *mut u8;
        }

        let new_layout = Layout::from_size_align_unchecked(new_size, layout.align());
        let new_ptr = aligned_alloc(new_layout);
        if !new_ptr.is_null() {
            core::ptr::copy_nonoverlapping(ptr, new_ptr, layout.size().min(new_size));
            Libc.free(ptr as *mut c_void);
        }
        new_ptr
    }
}

unsafe fn aligned_alloc(layout: Layout) -> *mut u8 {
    let mut out = core::ptr::null_mut();
    if libc::posix_memalign(&mut out, layout.align(), layout.size()) != 0 {
        return core::ptr::null_mut();
    }
    out as *mut u8
}

#[global_allocator]
static GLOBAL: InternalAllocator = InternalAllocator;
