//! Index Allocator - Variable-width index allocation for parallel arrays.
//!
//! Manages the dense index range `[0, num_indices)` of one processor:
//! - Runs of 1..K contiguous indices per allocation
//! - Free runs recycled first-fit, split when larger than the request
//! - Adjacent free runs coalesced on free
//! - Defragment slides live runs toward zero and shrinks the range
//!
//! The allocator owns no payload. Every change the owner's arrays must mirror
//! is returned as an [`AllocatorEvent`] and applied by the caller in order.

use crate::types::{MotiveDimension, MotiveIndex};

// =============================================================================
// Events
// =============================================================================

/// A change to the index space that parallel arrays must mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorEvent {
    /// The run of `count` indices starting at `old` now starts at `new`.
    ///
    /// Runs only ever move toward zero (`new < old`). When the source and
    /// destination overlap, copying slot by slot in ascending order is safe.
    Moved {
        old: MotiveIndex,
        new: MotiveIndex,
        count: MotiveDimension,
    },
    /// The index space is now exactly `[0, n)`.
    Resized(MotiveIndex),
}

/// Result of [`IndexAllocator::allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// First index of the new run.
    pub index: MotiveIndex,
    /// Events to apply before the run is used (at most one `Resized`).
    pub events: Vec<AllocatorEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FreeRun {
    start: MotiveIndex,
    len: MotiveDimension,
}

impl FreeRun {
    #[inline]
    fn end(&self) -> MotiveIndex {
        self.start + self.len
    }
}

// =============================================================================
// Allocator
// =============================================================================

/// Variable-width index allocator with compaction.
#[derive(Debug, Default, Clone)]
pub struct IndexAllocator {
    /// Run length at the first index of each allocated run, 0 elsewhere.
    counts: Vec<MotiveDimension>,

    /// Free runs, sorted by start and never adjacent to each other.
    free_runs: Vec<FreeRun>,
}

impl IndexAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `count` contiguous indices.
    ///
    /// Reuses the lowest free run that fits, splitting it if it is larger.
    /// Otherwise grows the index space, absorbing a free run at the tail.
    pub fn allocate(&mut self, count: MotiveDimension) -> Allocation {
        debug_assert!(count > 0, "allocation must occupy at least one index");
        let count = count.max(1);

        // First fit
        if let Some(pos) = self.free_runs.iter().position(|run| run.len >= count) {
            let run = &mut self.free_runs[pos];
            let index = run.start;
            if run.len == count {
                self.free_runs.remove(pos);
            } else {
                run.start += count;
                run.len -= count;
            }
            self.counts[index] = count;
            return Allocation { index, events: Vec::new() };
        }

        // Grow, starting inside a trailing free run if there is one
        let num_indices = self.counts.len();
        let index = match self.free_runs.last() {
            Some(run) if run.end() == num_indices => {
                let start = run.start;
                self.free_runs.pop();
                start
            }
            _ => num_indices,
        };
        let new_len = index + count;
        self.counts.resize(new_len, 0);
        self.counts[index] = count;

        Allocation {
            index,
            events: vec![AllocatorEvent::Resized(new_len)],
        }
    }

    /// Free the run starting at `index`.
    ///
    /// Returns the number of indices freed, or `None` if `index` is not the
    /// first index of an allocated run.
    pub fn free(&mut self, index: MotiveIndex) -> Option<MotiveDimension> {
        let count = self.count_for_index(index);
        if count == 0 {
            return None;
        }
        self.counts[index] = 0;
        self.insert_free_run(FreeRun { start: index, len: count });
        Some(count)
    }

    /// Number of indices in the run starting at `index` (0 if not allocated).
    #[inline]
    pub fn count_for_index(&self, index: MotiveIndex) -> MotiveDimension {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// True if `index` is the first index of an allocated run.
    #[inline]
    pub fn valid_index(&self, index: MotiveIndex) -> bool {
        self.count_for_index(index) > 0
    }

    /// Size of the index space.
    #[inline]
    pub fn num_indices(&self) -> MotiveIndex {
        self.counts.len()
    }

    /// Number of allocated runs.
    pub fn live_count(&self) -> usize {
        self.counts.iter().filter(|&&count| count > 0).count()
    }

    /// Number of indices occupied by allocated runs.
    pub fn used_indices(&self) -> MotiveIndex {
        self.counts.iter().sum()
    }

    /// Number of indices sitting in free runs.
    pub fn free_indices(&self) -> MotiveIndex {
        self.free_runs.iter().map(|run| run.len).sum()
    }

    /// First indices of all allocated runs, ascending.
    pub fn allocated_indices(&self) -> impl Iterator<Item = MotiveIndex> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(index, _)| index)
    }

    /// Slide every allocated run toward zero, closing all gaps.
    ///
    /// Returns the moves in ascending order, followed by a single `Resized`
    /// if the index space shrank. Run order is preserved.
    pub fn defragment(&mut self) -> Vec<AllocatorEvent> {
        let mut events = Vec::new();
        if self.free_runs.is_empty() {
            return events;
        }

        let num_indices = self.counts.len();
        let mut cursor = 0;
        let mut index = 0;
        while index < num_indices {
            let count = self.counts[index];
            if count == 0 {
                index += 1;
                continue;
            }
            if index != cursor {
                events.push(AllocatorEvent::Moved {
                    old: index,
                    new: cursor,
                    count,
                });
                self.counts[index] = 0;
                self.counts[cursor] = count;
            }
            cursor += count;
            index += count;
        }

        self.free_runs.clear();
        if cursor != num_indices {
            self.counts.truncate(cursor);
            events.push(AllocatorEvent::Resized(cursor));
        }
        events
    }

    /// Insert a free run, merging it with its neighbours.
    fn insert_free_run(&mut self, run: FreeRun) {
        let pos = self.free_runs.partition_point(|r| r.start < run.start);
        self.free_runs.insert(pos, run);

        // Merge with the following run
        if pos + 1 < self.free_runs.len() && self.free_runs[pos].end() == self.free_runs[pos + 1].start {
            let next = self.free_runs.remove(pos + 1);
            self.free_runs[pos].len += next.len;
        }

        // Merge with the preceding run
        if pos > 0 && self.free_runs[pos - 1].end() == self.free_runs[pos].start {
            let current = self.free_runs.remove(pos);
            self.free_runs[pos - 1].len += current.len;
        }
    }
}
