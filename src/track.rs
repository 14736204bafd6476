use core::fmt::{Debug, Display, Formatter, Result as FmtResult};
use heapless::FnvIndexMap as IndexMap;

use crate::stack::Fingerprint;

/// One deduplicated call stack and how many times it was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub fingerprint: Fingerprint,
    pub hits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Inserted,
    Incremented(usize),
}

/// A new call stack arrived after every slot was taken. It is not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub capacity: usize,
}

impl Display for CapacityExceeded {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "trace count {} not enough", self.capacity)
    }
}

impl std::error::Error for CapacityExceeded {}

/// Fixed-capacity table of call stacks with a hit counter each.
///
/// Records are never removed. Iteration follows first-seen order. The store
/// does no locking of its own; callers serialise access.
#[derive(Clone, PartialEq)]
pub struct TraceStore<const N: usize> {
    traces: IndexMap<Fingerprint, usize, N>,
}

impl<const N: usize> TraceStore<N> {
    pub const fn new() -> Self {
        Self {
            traces: IndexMap::new(),
        }
    }

    /// Counts one occurrence of `fingerprint`.
    pub fn record(&mut self, fingerprint: &Fingerprint) -> Result<Recorded, CapacityExceeded> {
        if let Some(hits) = self.traces.get_mut(fingerprint) {
            *hits += 1;
            return Ok(Recorded::Incremented(*hits));
        }

        match self.traces.insert(*fingerprint, 1) {
            Ok(_) => Ok(Recorded::Inserted),
            Err(_) => Err(CapacityExceeded { capacity: N }),
        }
    }

    pub fn hits(&self, fingerprint: &Fingerprint) -> Option<usize> {
        self.traces.get(fingerprint).copied()
    }

    pub fn records(&self) -> impl Iterator<Item = TraceRecord> + '_ {
        self.traces.iter().map(|(fingerprint, hits)| TraceRecord {
            fingerprint: *fingerprint,
            hits: *hits,
        })
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_full(&self) -> bool {
        self.traces.len() == N
    }
}

impl<const N: usize> Default for TraceStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Debug for TraceStore<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TraceStore")
            .field("traces", &self.traces)
            .finish()
    }
}
