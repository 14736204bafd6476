//! Call-stack capture.
//!
//! A [`Fingerprint`] is the identity of a call site: up to [`TRACE_DEPTH`]
//! return addresses, innermost first. Slots past `depth` are always zero, so
//! the derived equality is exactly "same depth, same addresses in order".

use core::fmt::{Debug, Formatter, Result as FmtResult};

use crate::config::TRACE_DEPTH;

/// Frames walked before giving up on finding the capturer's own frame.
const SCAN_DEPTH: usize = TRACE_DEPTH + 24;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    frames: [usize; TRACE_DEPTH],
    depth: usize,
}

impl Fingerprint {
    pub const EMPTY: Self = Self {
        frames: [0; TRACE_DEPTH],
        depth: 0,
    };

    /// Builds a fingerprint from the given return addresses, keeping at most
    /// the first [`TRACE_DEPTH`] of them.
    pub fn from_frames(frames: &[usize]) -> Self {
        let depth = frames.len().min(TRACE_DEPTH);
        let mut fingerprint = Self::EMPTY;
        fingerprint.frames[..depth].copy_from_slice(&frames[..depth]);
        fingerprint.depth = depth;
        fingerprint
    }

    pub fn frames(&self) -> &[usize] {
        &self.frames[..self.depth]
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }
}

impl Debug for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut list = f.debug_list();
        for frame in self.frames() {
            list.entry(&format_args!("{frame:#x}"));
        }
        list.finish()
    }
}

/// Captures the caller's stack, keeping at most `max_depth` frames (never
/// more than [`TRACE_DEPTH`]).
///
/// Frames belonging to the unwinder and to this function are dropped, so the
/// first address is the return address into whoever called `capture`. Works
/// entirely on the stack; if the unwinder yields nothing the result is
/// [`Fingerprint::EMPTY`].
#[inline(never)]
pub fn capture(max_depth: usize) -> Fingerprint {
    let own_address = capture as *const () as usize;
    fingerprint_from_walk(own_address, max_depth, |visit| {
        backtrace::trace(|frame| visit(frame.symbol_address() as usize, frame.ip() as usize));
    })
}

/// Turns one unwind into a fingerprint. `walk` feeds `(symbol address, ip)`
/// pairs, innermost first, to the visitor until it returns false.
fn fingerprint_from_walk<W>(own_address: usize, max_depth: usize, walk: W) -> Fingerprint
where
    W: FnOnce(&mut dyn FnMut(usize, usize) -> bool),
{
    let mut scratch = [0usize; SCAN_DEPTH];
    let mut walked = 0;
    let mut own_frame = None;

    walk(&mut |symbol_address, ip| {
        // The outermost frame of a thread has no return address.
        if ip == 0 {
            return false;
        }
        if own_frame.is_none() && symbol_address == own_address {
            own_frame = Some(walked);
        }
        scratch[walked] = ip;
        walked += 1;
        walked < SCAN_DEPTH
    });

    // Fall back to the raw walk when the unwinder cannot name our frame.
    let start = own_frame.map_or(0, |index| index + 1).min(walked);
    let end = walked.min(start + max_depth.min(TRACE_DEPTH));
    Fingerprint::from_frames(&scratch[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn capture_from_a() -> Fingerprint {
        capture(TRACE_DEPTH)
    }

    #[inline(never)]
    fn capture_from_b() -> Fingerprint {
        capture(TRACE_DEPTH)
    }

    #[test]
    fn from_frames_truncates_to_depth() {
        let frames: Vec<usize> = (1..=TRACE_DEPTH + 4).collect();
        let fingerprint = Fingerprint::from_frames(&frames);

        assert_eq!(fingerprint.depth(), TRACE_DEPTH);
        assert_eq!(fingerprint.frames(), &frames[..TRACE_DEPTH]);
    }

    #[test]
    fn prefix_is_a_different_fingerprint() {
        let long = Fingerprint::from_frames(&[0x10, 0x20, 0x30]);
        let short = Fingerprint::from_frames(&[0x10, 0x20]);
        let shifted = Fingerprint::from_frames(&[0x20, 0x30]);

        assert_ne!(long, short);
        assert_ne!(long, shifted);
        assert_eq!(long, Fingerprint::from_frames(&[0x10, 0x20, 0x30]));
    }

    #[test]
    fn empty_frames_coalesce() {
        assert_eq!(Fingerprint::from_frames(&[]), Fingerprint::EMPTY);
        assert!(Fingerprint::EMPTY.is_empty());
    }

    #[test]
    fn debug_lists_addresses() {
        let fingerprint = Fingerprint::from_frames(&[0x10, 0xff]);
        assert_eq!(format!("{fingerprint:?}"), "[0x10, 0xff]");
    }

    #[test]
    fn same_site_captures_same_stack() {
        let mut stacks = Vec::new();
        for _ in 0..3 {
            stacks.push(capture_from_a());
        }

        assert!(!stacks[0].is_empty());
        assert!(stacks.iter().all(|stack| *stack == stacks[0]));
    }

    #[test]
    fn different_sites_capture_different_stacks() {
        assert_ne!(capture_from_a(), capture_from_b());
    }

    fn replay(
        frames: &[(usize, usize)],
    ) -> impl FnOnce(&mut dyn FnMut(usize, usize) -> bool) + '_ {
        move |visit: &mut dyn FnMut(usize, usize) -> bool| {
            for (symbol_address, ip) in frames {
                if !visit(*symbol_address, *ip) {
                    break;
                }
            }
        }
    }

    #[test]
    fn walk_drops_unwinder_frames_and_the_null_terminator() {
        let frames = [(0x900, 0x901), (0x100, 0x104), (0x200, 0x210), (0x300, 0x320), (0, 0)];
        let fingerprint = fingerprint_from_walk(0x100, TRACE_DEPTH, replay(&frames));

        assert_eq!(fingerprint.frames(), &[0x210, 0x320]);
    }

    #[test]
    fn walk_stops_at_max_depth() {
        let frames: Vec<(usize, usize)> = (1..=20).map(|i| (i * 0x100, i * 0x100 + 4)).collect();

        let shallow = fingerprint_from_walk(0x100, 3, replay(&frames));
        assert_eq!(shallow.frames(), &[0x204, 0x304, 0x404]);

        let capped = fingerprint_from_walk(0x100, usize::MAX, replay(&frames));
        assert_eq!(capped.depth(), TRACE_DEPTH);
    }

    #[test]
    fn walk_without_own_frame_keeps_everything() {
        let frames = [(0x900, 0x901), (0x910, 0x911), (0, 0), (0x920, 0x921)];
        let fingerprint = fingerprint_from_walk(0x100, TRACE_DEPTH, replay(&frames));

        assert_eq!(fingerprint.frames(), &[0x901, 0x911]);
    }

    #[test]
    fn empty_walk_is_the_empty_fingerprint() {
        let fingerprint = fingerprint_from_walk(0x100, TRACE_DEPTH, replay(&[]));
        assert_eq!(fingerprint, Fingerprint::EMPTY);
    }

    #[test]
    fn thread_stacks_never_end_in_a_null_frame() {
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let fingerprint = capture(TRACE_DEPTH);
                assert!(!fingerprint.is_empty());
                assert!(fingerprint.frames().iter().all(|ip| *ip != 0));
            });
        });
    }
}
