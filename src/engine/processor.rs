//! Motive Processor - Shared storage for every motivator of one algorithm.
//!
//! A processor owns all the data for all motivators that use its algorithm.
//! Motivators are NOT objects. They are indices into the processor's parallel
//! arrays:
//!
//! ```text
//! Index 0: value=1.0  velocity=0.0  target=5.0   link → Motivator A
//! Index 1: value=0.0  velocity=0.2  target=1.0   link → Motivator B
//! Index 2: (free)                                 link → None
//! ```
//!
//! The processor splits into three parts:
//! - [`MotiveProcessor`]: the algorithm. Implements the payload hooks.
//! - [`ProcessorCore`]: index allocation and back-references to motivator links.
//! - [`ProcessorLifecycle`]: initialize / remove / transfer / defragment.
//!   Implemented once for every processor, so algorithms cannot override it.
//!
//! Allocator events (moves and resizes) are applied here, in order, to both
//! the algorithm's arrays and the motivator links.

use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::index_allocator::{Allocation, AllocatorEvent, IndexAllocator};
use super::motivator_link::{LinkState, MotivatorLink};
use super::motive_engine::MotiveEngine;
use crate::error::{MotiveError, Result};
use crate::types::{MotiveDimension, MotiveIndex, MotiveTime, MotivatorInit, MotivatorType, ProcessorId};

// =============================================================================
// Processor Core
// =============================================================================

/// Index bookkeeping shared by every processor.
///
/// Each concrete processor embeds one of these and exposes it through
/// [`MotiveProcessor::core`].
#[derive(Debug)]
pub struct ProcessorCore {
    id: ProcessorId,

    /// Hands out indices. Freed runs are reused first; `defragment` moves
    /// later runs into the holes to keep the arrays short.
    allocator: IndexAllocator,

    /// Back-reference to the link of the motivator at each live index.
    /// Only the first index of a run holds a link. When a run moves, the
    /// link's index is rewritten.
    links: Vec<Option<Rc<MotivatorLink>>>,

    /// Free indices tolerated before [`ProcessorLifecycle::defragment_if_needed`] compacts.
    defragment_threshold: usize,
}

impl ProcessorCore {
    pub fn new() -> Self {
        Self {
            id: ProcessorId::next(),
            allocator: IndexAllocator::new(),
            links: Vec::new(),
            defragment_threshold: 0,
        }
    }

    pub fn with_defragment_threshold(mut self, threshold: usize) -> Self {
        self.defragment_threshold = threshold;
        self
    }

    #[inline]
    pub fn id(&self) -> ProcessorId {
        self.id
    }

    /// Size of the index space. Payload arrays must be exactly this long.
    #[inline]
    pub fn num_indices(&self) -> MotiveIndex {
        self.allocator.num_indices()
    }

    /// Number of live motivators.
    pub fn live_count(&self) -> usize {
        self.allocator.live_count()
    }

    /// Number of indices waiting to be reclaimed by a defragment.
    pub fn free_count(&self) -> usize {
        self.allocator.free_indices()
    }

    /// Link of the motivator at `index`.
    pub fn link(&self, index: MotiveIndex) -> Option<&Rc<MotivatorLink>> {
        self.links.get(index).and_then(Option::as_ref)
    }
}

impl Default for ProcessorCore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessorCore {
    /// Unbind every motivator still referencing this processor.
    fn drop(&mut self) {
        for link in self.links.iter().flatten() {
            link.clear();
        }
    }
}

// =============================================================================
// Algorithm Trait
// =============================================================================

/// One animation algorithm, processing *all* motivators of its type.
///
/// Implementors keep their payload in parallel arrays indexed like the
/// [`ProcessorCore`] and implement the index hooks below. Lifecycle
/// operations come from [`ProcessorLifecycle`].
pub trait MotiveProcessor {
    fn core(&self) -> &ProcessorCore;

    fn core_mut(&mut self) -> &mut ProcessorCore;

    /// Advance every live motivator by `delta_time`.
    ///
    /// Called once per engine step, after every processor of lower priority.
    fn advance_frame(&mut self, delta_time: MotiveTime);

    /// Static identity of the algorithm.
    fn motivator_type(&self) -> MotivatorType;

    /// Update order. Lower runs first. Must never change.
    fn priority(&self) -> i32;

    /// Seed the payload for a newly allocated index.
    ///
    /// `init` always reports this processor's type. `engine` may be used to
    /// create child motivators. On error, the index is freed again.
    fn initialize_index(
        &mut self,
        init: &dyn MotivatorInit,
        index: MotiveIndex,
        engine: &MotiveEngine,
    ) -> Result<()>;

    /// Release payload-level resources at `index`.
    fn remove_index(&mut self, index: MotiveIndex);

    /// Move payload from `old_index` to `new_index`. `new_index` is inactive.
    fn move_index(&mut self, old_index: MotiveIndex, new_index: MotiveIndex);

    /// Grow or shrink payload arrays to exactly `num_indices`.
    ///
    /// New entries are reset. When shrinking, indices at or above
    /// `num_indices` are already inactive.
    fn set_num_indices(&mut self, num_indices: MotiveIndex);

    /// Length of the payload arrays, if the algorithm wants it verified.
    fn payload_len(&self) -> Option<MotiveIndex> {
        None
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Index lifecycle operations available on every processor.
pub trait ProcessorLifecycle {
    /// Allocate `dimensions` indices for the motivator behind `link`, seed
    /// them, and bind the link.
    ///
    /// If `link` currently references an entry of this processor, that entry
    /// is removed first. Fails before any mutation if `dimensions` is zero or
    /// `init` is for another processor type.
    fn initialize_motivator(
        &mut self,
        init: &dyn MotivatorInit,
        engine: &MotiveEngine,
        link: &Rc<MotivatorLink>,
        dimensions: MotiveDimension,
    ) -> Result<MotiveIndex>;

    /// Remove the motivator at `index` and return its run to the allocator.
    ///
    /// The owning link is cleared.
    fn remove_motivator(&mut self, index: MotiveIndex) -> Result<()>;

    /// Hand the motivator at `index` to `new_link`, leaving payload untouched.
    ///
    /// The previous link is cleared. No-op if `index` is not live.
    fn transfer_motivator(&mut self, index: MotiveIndex, new_link: &Rc<MotivatorLink>);

    /// True if `index` is currently driving a motivator.
    fn valid_index(&self, index: MotiveIndex) -> bool;

    /// True if `index` is currently driving exactly `link`.
    fn valid_motivator(&self, index: MotiveIndex, link: &Rc<MotivatorLink>) -> bool;

    /// Number of indices occupied by the motivator at `index`.
    fn dimensions(&self, index: MotiveIndex) -> MotiveDimension;

    /// Compact live indices toward zero, rewriting links that move.
    fn defragment(&mut self);

    /// Defragment if more indices are free than the core's threshold allows.
    fn defragment_if_needed(&mut self);

    /// Remove entries whose motivator was dropped while this processor was
    /// borrowed. The processor then holds the only reference to the link.
    ///
    /// Returns the number of entries removed.
    fn remove_orphaned_motivators(&mut self) -> usize;

    /// Check that links, allocator and payload agree.
    ///
    /// Side-effect free. An error means a hook implementation broke the
    /// index contract.
    fn verify_internal_state(&self) -> Result<()>;
}

impl<P: MotiveProcessor + ?Sized> ProcessorLifecycle for P {
    fn initialize_motivator(
        &mut self,
        init: &dyn MotivatorInit,
        engine: &MotiveEngine,
        link: &Rc<MotivatorLink>,
        dimensions: MotiveDimension,
    ) -> Result<MotiveIndex> {
        if dimensions == 0 {
            return Err(MotiveError::InvalidDimensions);
        }
        let expected = self.motivator_type();
        if init.motivator_type() != expected {
            return Err(MotiveError::WrongInit {
                expected,
                found: init.motivator_type(),
            });
        }

        // Re-initialization drops the entry this link owned here
        if let Some(state) = link.state() {
            if state.processor == self.core().id && self.valid_motivator(state.index, link) {
                self.remove_motivator(state.index)?;
            }
        }

        let Allocation { index, events } = self.core_mut().allocator.allocate(dimensions);
        apply_allocator_events(self, events);

        if let Err(err) = self.initialize_index(init, index, engine) {
            self.core_mut().allocator.free(index);
            debug!(processor = %self.core().id, index, %err, "motivator initialization failed");
            return Err(err);
        }

        let core = self.core_mut();
        core.links[index] = Some(Rc::clone(link));
        link.bind(LinkState {
            processor: core.id,
            index,
            dimensions,
        });
        trace!(processor = %core.id, index, dimensions, "motivator initialized");
        Ok(index)
    }

    fn remove_motivator(&mut self, index: MotiveIndex) -> Result<()> {
        if !self.valid_index(index) {
            return Err(MotiveError::InvalidIndex {
                processor: self.core().id,
                index,
            });
        }

        self.remove_index(index);

        let core = self.core_mut();
        if let Some(link) = core.links[index].take() {
            link.clear();
        }
        core.allocator.free(index);
        trace!(processor = %core.id, index, "motivator removed");
        Ok(())
    }

    fn transfer_motivator(&mut self, index: MotiveIndex, new_link: &Rc<MotivatorLink>) {
        if !self.valid_index(index) {
            trace!(processor = %self.core().id, index, "transfer of inactive index ignored");
            return;
        }

        let core = self.core_mut();
        let dimensions = core.allocator.count_for_index(index);
        if let Some(old_link) = core.links[index].replace(Rc::clone(new_link)) {
            if !Rc::ptr_eq(&old_link, new_link) {
                old_link.clear();
            }
        }
        new_link.bind(LinkState {
            processor: core.id,
            index,
            dimensions,
        });
        trace!(processor = %core.id, index, "motivator transferred");
    }

    fn valid_index(&self, index: MotiveIndex) -> bool {
        let core = self.core();
        core.link(index)
            .is_some_and(|link| link.processor() == Some(core.id))
    }

    fn valid_motivator(&self, index: MotiveIndex, link: &Rc<MotivatorLink>) -> bool {
        self.valid_index(index)
            && self.core().link(index).is_some_and(|owner| Rc::ptr_eq(owner, link))
    }

    fn dimensions(&self, index: MotiveIndex) -> MotiveDimension {
        self.core().allocator.count_for_index(index)
    }

    fn defragment(&mut self) {
        let events = self.core_mut().allocator.defragment();
        if events.is_empty() {
            return;
        }
        debug!(processor = %self.core().id, events = events.len(), "defragmenting");
        apply_allocator_events(self, events);
    }

    fn defragment_if_needed(&mut self) {
        let core = self.core();
        if core.free_count() > core.defragment_threshold {
            self.defragment();
        }
    }

    fn remove_orphaned_motivators(&mut self) -> usize {
        let orphans: Vec<MotiveIndex> = self
            .core()
            .links
            .iter()
            .enumerate()
            .filter(|(_, link)| link.as_ref().is_some_and(|link| Rc::strong_count(link) == 1))
            .map(|(index, _)| index)
            .collect();

        for &index in &orphans {
            if let Err(err) = self.remove_motivator(index) {
                warn!(processor = %self.core().id, index, %err, "orphaned motivator not removed");
            }
        }
        if !orphans.is_empty() {
            debug!(processor = %self.core().id, count = orphans.len(), "orphaned motivators removed");
        }
        orphans.len()
    }

    fn verify_internal_state(&self) -> Result<()> {
        let core = self.core();
        let inconsistent = |index: MotiveIndex, message: String| MotiveError::Inconsistent {
            processor: core.id,
            index,
            message,
        };

        let num_indices = core.allocator.num_indices();
        if core.links.len() != num_indices {
            return Err(inconsistent(
                core.links.len(),
                format!("{} back-references for {} indices", core.links.len(), num_indices),
            ));
        }
        if let Some(len) = self.payload_len() {
            if len != num_indices {
                return Err(inconsistent(len, format!("payload holds {len} entries for {num_indices} indices")));
            }
        }

        let mut run_end = 0;
        for (index, link) in core.links.iter().enumerate() {
            let count = core.allocator.count_for_index(index);
            match (count, link) {
                (0, None) => {}
                (0, Some(_)) => {
                    return Err(inconsistent(index, "inactive index references a motivator".into()));
                }
                (_, None) => {
                    return Err(inconsistent(index, "live index has no motivator".into()));
                }
                (count, Some(link)) => {
                    let expected = LinkState {
                        processor: core.id,
                        index,
                        dimensions: count,
                    };
                    if link.state() != Some(expected) {
                        return Err(inconsistent(
                            index,
                            format!("motivator link reads {:?}, expected {:?}", link.state(), expected),
                        ));
                    }
                    if index < run_end {
                        return Err(inconsistent(index, "run starts inside the previous run".into()));
                    }
                    run_end = index + count;
                }
            }
        }
        if run_end > num_indices {
            return Err(inconsistent(run_end, format!("run extends past {num_indices} indices")));
        }
        Ok(())
    }
}

/// Mirror allocator events into the algorithm's arrays and the links.
fn apply_allocator_events<P: MotiveProcessor + ?Sized>(processor: &mut P, events: Vec<AllocatorEvent>) {
    for event in events {
        match event {
            AllocatorEvent::Moved { old, new, count } => {
                // Ascending order is safe for overlapping runs since new < old
                for offset in 0..count {
                    processor.move_index(old + offset, new + offset);
                }

                let core = processor.core_mut();
                debug_assert!(core.links[new].is_none(), "moving onto a live index");
                let link = core.links[old].take();
                if let Some(link) = &link {
                    link.set_index(new);
                }
                core.links[new] = link;
                trace!(processor = %core.id, old, new, count, "index moved");
            }
            AllocatorEvent::Resized(num_indices) => {
                processor.set_num_indices(num_indices);
                let core = processor.core_mut();
                core.links.resize(num_indices, None);
                trace!(processor = %core.id, num_indices, "indices resized");
            }
        }
    }
}
