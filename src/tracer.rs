//! The tracing context: intercepts the four allocation primitives and counts
//! every call by call stack.

use core::ffi::c_void;
use core::fmt::{Display, Formatter, Result as FmtResult};
use libc::size_t;
use spin::Mutex;
use tracing::{debug, warn};

use crate::config::{TRACE_CAPACITY, TRACE_DEPTH};
use crate::guard::{Guard, Phase};
use crate::raw::RawAllocator;
use crate::report::{read_cmdline, Report};
use crate::stack::{self, Fingerprint};
use crate::track::{TraceRecord, TraceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Alloc,
    Free,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Direction::Alloc => f.write_str("alloc"),
            Direction::Free => f.write_str("free"),
        }
    }
}

struct TraceState<const N: usize> {
    outstanding: isize,
    allocs: TraceStore<N>,
    frees: TraceStore<N>,
}

impl<const N: usize> TraceState<N> {
    const fn new() -> Self {
        Self {
            outstanding: 0,
            allocs: TraceStore::new(),
            frees: TraceStore::new(),
        }
    }

    fn record(&mut self, direction: Direction, fingerprint: &Fingerprint) {
        let store = match direction {
            Direction::Alloc => {
                self.outstanding += 1;
                &mut self.allocs
            }
            Direction::Free => {
                self.outstanding -= 1;
                &mut self.frees
            }
        };

        if let Err(err) = store.record(fingerprint) {
            warn!("{direction} {err}, dropping stack {fingerprint:?}");
        }
    }
}

/// Owns both trace stores, the outstanding-block counter and the lifecycle.
///
/// One instance backs the preloaded shim (see [`crate::globals::TRACER`]);
/// tests build their own.
///
/// `resize` is traced as a free of the old pointer followed by an allocation
/// of the new one. The free only moves the counter and the free store; the
/// record of the original allocation keeps its hits, so a block that was
/// allocated at one site and grown at another shows up under both.
pub struct Tracer<A, const N: usize = TRACE_CAPACITY> {
    allocator: A,
    guard: Guard,
    state: Mutex<TraceState<N>>,
}

impl<A: RawAllocator, const N: usize> Tracer<A, N> {
    pub const fn new(allocator: A) -> Self {
        Self {
            allocator,
            guard: Guard::new(),
            state: Mutex::new(TraceState::new()),
        }
    }

    /// Starts tracing. Returns false unless the tracer had never been started.
    pub fn start(&self) -> bool {
        let _state = self.state.lock();
        let started = self.guard.advance(Phase::Inactive, Phase::Active);
        if started {
            debug!("allocation tracing active");
        }
        started
    }

    /// Stops tracing for good and collects the report. Returns `None` unless
    /// the tracer was active.
    pub fn finish(&self) -> Option<Report> {
        {
            let _state = self.state.lock();
            if !self.guard.advance(Phase::Active, Phase::Reporting) {
                return None;
            }
        }

        let (outstanding, allocations, frees) = {
            let state = self.state.lock();
            (
                state.outstanding,
                state.allocs.records().collect::<Vec<TraceRecord>>(),
                state.frees.records().collect::<Vec<TraceRecord>>(),
            )
        };

        Some(Report::new(read_cmdline(), outstanding, allocations, frees))
    }

    pub fn phase(&self) -> Phase {
        self.guard.phase()
    }

    /// Net traced allocations not yet matched by a traced free.
    pub fn outstanding(&self) -> isize {
        self.state.lock().outstanding
    }

    /// # Safety
    ///
    /// Same contract as C `malloc`.
    pub unsafe fn allocate(&self, size: size_t) -> *mut c_void {
        let ptr = self.allocator.malloc(size);
        if !ptr.is_null() && size > 0 {
            self.notify(Direction::Alloc);
        }
        ptr
    }

    /// # Safety
    ///
    /// Same contract as C `free`.
    pub unsafe fn deallocate(&self, ptr: *mut c_void) {
        if ptr.is_null() {
            return;
        }
        self.allocator.free(ptr);
        self.notify(Direction::Free);
    }

    /// # Safety
    ///
    /// Same contract as C `calloc`.
    pub unsafe fn allocate_zeroed(&self, count: size_t, size: size_t) -> *mut c_void {
        let ptr = self.allocator.calloc(count, size);
        if !ptr.is_null() && count.wrapping_mul(size) > 0 {
            self.notify(Direction::Alloc);
        }
        ptr
    }

    /// # Safety
    ///
    /// Same contract as C `realloc`.
    pub unsafe fn resize(&self, ptr: *mut c_void, size: size_t) -> *mut c_void {
        let new_ptr = self.allocator.realloc(ptr, size);
        if !ptr.is_null() {
            self.notify(Direction::Free);
        }
        if !new_ptr.is_null() && size > 0 {
            self.notify(Direction::Alloc);
        }
        new_ptr
    }

    fn notify(&self, direction: Direction) {
        if !self.guard.is_tracing() {
            return;
        }

        let mut state = self.state.lock();
        // Tracing may have been switched off while we waited for the lock.
        if !self.guard.is_tracing() {
            return;
        }

        let _suspended = self.guard.suspend();
        let fingerprint = stack::capture(TRACE_DEPTH);
        state.record(direction, &fingerprint);
    }
}
