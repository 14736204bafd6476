//! Re-entrancy guard and the tracer's lifecycle flag.
//!
//! The phase is process-wide and only moves forward. While a thread runs the
//! tracer's own bookkeeping it is recorded as the owner, and any allocation
//! it makes in the meantime (from the unwinder, the logger, ...) sees tracing
//! as inactive. Other threads are not affected by the owner and queue on the
//! tracer's lock instead.

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

const NO_OWNER: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Inactive = 0,
    Active = 1,
    Reporting = 2,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Phase::Inactive,
            1 => Phase::Active,
            _ => Phase::Reporting,
        }
    }
}

pub struct Guard {
    phase: AtomicU8,
    owner: AtomicUsize,
}

impl Guard {
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Inactive as u8),
            owner: AtomicUsize::new(NO_OWNER),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to`. Returns false if the guard was not in `from`.
    pub fn advance(&self, from: Phase, to: Phase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether an allocation event on the calling thread should be traced.
    pub fn is_tracing(&self) -> bool {
        self.phase() == Phase::Active && self.owner.load(Ordering::Acquire) != current_thread()
    }

    /// Marks the calling thread as running tracer bookkeeping until the
    /// returned scope is dropped. Callers must hold the tracer's lock.
    pub fn suspend(&self) -> Suspended<'_> {
        self.owner.store(current_thread(), Ordering::Release);
        Suspended { guard: self }
    }
}

#[must_use]
pub struct Suspended<'a> {
    guard: &'a Guard,
}

impl Drop for Suspended<'_> {
    fn drop(&mut self) {
        self.guard.owner.store(NO_OWNER, Ordering::Release);
    }
}

fn current_thread() -> usize {
    unsafe { libc::pthread_self() as usize }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_only_move_forward() {
        let guard = Guard::new();
        assert_eq!(guard.phase(), Phase::Inactive);
        assert!(!guard.is_tracing());

        assert!(!guard.advance(Phase::Active, Phase::Reporting));
        assert!(guard.advance(Phase::Inactive, Phase::Active));
        assert!(guard.is_tracing());

        assert!(guard.advance(Phase::Active, Phase::Reporting));
        assert!(!guard.is_tracing());
        assert!(!guard.advance(Phase::Inactive, Phase::Active));
        assert_eq!(guard.phase(), Phase::Reporting);
    }

    #[test]
    fn suspension_is_scoped_to_the_owner() {
        let guard = Guard::new();
        guard.advance(Phase::Inactive, Phase::Active);

        {
            let _suspended = guard.suspend();
            assert!(!guard.is_tracing());

            std::thread::scope(|scope| {
                scope.spawn(|| assert!(guard.is_tracing()));
            });
        }

        assert!(guard.is_tracing());
    }
}
