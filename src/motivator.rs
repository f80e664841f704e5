//! Motivators - The external handles users hold.
//!
//! A motivator is a lightweight reference into a processor: a shared
//! [`MotivatorLink`] plus a `Weak` pointer to the processor. All data lives in
//! the processor. Only one motivator may reference an entry at a time.
//!
//! - [`Motivator1f`] drives a single float through a [`ScalarProcessor`].
//! - [`MotivatorMatrix4f`] drives a 4x4 matrix through a [`MatrixProcessor`].
//!
//! Dropping a bound motivator removes its entry from the processor.
//!
//! # Example
//!
//! ```ignore
//! use spark_motive::{EngineConfig, MotiveEngine, MotiveTarget1f, Motivator1f};
//! use spark_motive::processors::LinearInit;
//!
//! let engine = MotiveEngine::with_defaults(EngineConfig::default());
//! let mut fade = Motivator1f::new();
//! fade.initialize(&LinearInit::new(0.0), &engine)?;
//! fade.set_target(&MotiveTarget1f::target(1.0, 0.0, 250));
//!
//! engine.advance_frame(16);
//! let alpha = fade.value();
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use nalgebra::{Matrix4, Vector3};
use tracing::{debug, warn};

use crate::engine::{MatrixProcessor, MotiveEngine, MotiveProcessor, MotivatorLink, ProcessorLifecycle, ScalarProcessor};
use crate::error::{MotiveError, Result};
use crate::types::{
    MotiveChildIndex, MotiveDimension, MotiveIndex, MotiveTarget1f, MotiveTime, MotivatorInit, MotivatorType,
    SplinePlayback,
};

// =============================================================================
// Processor Kinds
// =============================================================================

/// A family of processors a motivator handle can bind to.
pub trait ProcessorKind: MotiveProcessor {
    /// Find the processor for `motivator_type` in `engine`.
    fn lookup(engine: &MotiveEngine, motivator_type: MotivatorType) -> Result<Rc<RefCell<Self>>>;
}

impl ProcessorKind for dyn ScalarProcessor {
    fn lookup(engine: &MotiveEngine, motivator_type: MotivatorType) -> Result<Rc<RefCell<Self>>> {
        engine.scalar_processor(motivator_type)
    }
}

impl ProcessorKind for dyn MatrixProcessor {
    fn lookup(engine: &MotiveEngine, motivator_type: MotivatorType) -> Result<Rc<RefCell<Self>>> {
        engine.matrix_processor(motivator_type)
    }
}

// =============================================================================
// Motivator
// =============================================================================

/// Handle to one entry in a processor of kind `P`.
pub struct Motivator<P: ProcessorKind + ?Sized> {
    link: Rc<MotivatorLink>,
    processor: Option<BoundProcessor<P>>,
}

struct BoundProcessor<P: ?Sized> {
    motivator_type: MotivatorType,
    processor: Weak<RefCell<P>>,
}

/// Drives one float value.
pub type Motivator1f = Motivator<dyn ScalarProcessor>;

/// Drives one 4x4 matrix.
pub type MotivatorMatrix4f = Motivator<dyn MatrixProcessor>;

impl<P: ProcessorKind + ?Sized> Motivator<P> {
    /// Create an unbound motivator.
    pub fn new() -> Self {
        Self {
            link: Rc::new(MotivatorLink::new()),
            processor: None,
        }
    }

    /// Bind to a new single-index entry in the processor of `init`'s type.
    ///
    /// Any entry this motivator referenced before is removed first.
    pub fn initialize(&mut self, init: &dyn MotivatorInit, engine: &MotiveEngine) -> Result<()> {
        self.initialize_with_dimensions(init, engine, 1)
    }

    /// Bind to a new entry spanning `dimensions` contiguous indices.
    pub fn initialize_with_dimensions(
        &mut self,
        init: &dyn MotivatorInit,
        engine: &MotiveEngine,
        dimensions: MotiveDimension,
    ) -> Result<()> {
        if dimensions == 0 {
            return Err(MotiveError::InvalidDimensions);
        }
        let motivator_type = init.motivator_type();
        let processor = P::lookup(engine, motivator_type)?;

        self.release()?;

        let mut p = processor
            .try_borrow_mut()
            .map_err(|_| MotiveError::ProcessorBusy(motivator_type))?;
        p.initialize_motivator(init, engine, &self.link, dimensions)?;
        drop(p);

        self.processor = Some(BoundProcessor {
            motivator_type,
            processor: Rc::downgrade(&processor),
        });
        Ok(())
    }

    /// Remove the referenced entry and unbind.
    ///
    /// If the processor is busy the motivator stays bound and valid.
    pub fn invalidate(&mut self) {
        if let Err(err) = self.release() {
            warn!(index = ?self.link.index(), %err, "motivator left bound");
        }
    }

    /// Remove the referenced entry and unbind, unless the processor is busy.
    fn release(&mut self) -> Result<()> {
        let Some(bound) = &self.processor else {
            self.link.clear();
            return Ok(());
        };
        if let (Some(processor), Some(index)) = (bound.processor.upgrade(), self.link.index()) {
            let Ok(mut p) = processor.try_borrow_mut() else {
                return Err(MotiveError::ProcessorBusy(bound.motivator_type));
            };
            if p.valid_motivator(index, &self.link) {
                if let Err(err) = p.remove_motivator(index) {
                    warn!(index, %err, "motivator removal failed");
                }
            }
        }
        self.processor = None;
        self.link.clear();
        Ok(())
    }

    /// True if the processor still drives this motivator.
    pub fn valid(&self) -> bool {
        self.with(|_, _| ()).is_some()
    }

    /// Current index in the processor. Changes when the processor defragments.
    pub fn index(&self) -> Option<MotiveIndex> {
        self.link.index()
    }

    /// Number of indices the entry occupies.
    pub fn dimensions(&self) -> Option<MotiveDimension> {
        self.with(|p, index| p.dimensions(index))
    }

    pub fn link(&self) -> &Rc<MotivatorLink> {
        &self.link
    }

    /// Take over the entry `source` references. `source` ends up unbound.
    ///
    /// Any entry this motivator referenced before is removed first. If either
    /// processor is busy, both motivators are left as they were.
    pub fn take_from(&mut self, source: &mut Self) {
        if let Err(err) = self.release() {
            warn!(%err, "transfer skipped");
            return;
        }

        let Some(bound) = source.processor.take() else {
            source.link.clear();
            return;
        };
        let (Some(processor), Some(index)) = (bound.processor.upgrade(), source.link.index()) else {
            source.link.clear();
            return;
        };

        match processor.try_borrow_mut() {
            Ok(mut p) => {
                if p.valid_motivator(index, &source.link) {
                    p.transfer_motivator(index, &self.link);
                }
            }
            Err(_) => {
                warn!(index, "processor busy; transfer skipped");
                source.processor = Some(bound);
                return;
            }
        }
        source.link.clear();
        if self.link.is_bound() {
            self.processor = Some(bound);
        }
    }

    /// Run `f` against the processor if this motivator is valid.
    fn with<R>(&self, f: impl FnOnce(&P, MotiveIndex) -> R) -> Option<R> {
        let processor = self.processor.as_ref()?.processor.upgrade()?;
        let index = self.link.index()?;
        let p = processor.try_borrow().ok()?;
        if !p.valid_motivator(index, &self.link) {
            return None;
        }
        let result = f(&p, index);
        Some(result)
    }

    /// Run `f` against the processor mutably if this motivator is valid.
    fn with_mut<R>(&self, f: impl FnOnce(&mut P, MotiveIndex) -> R) -> Option<R> {
        let processor = self.processor.as_ref()?.processor.upgrade()?;
        let index = self.link.index()?;
        let mut p = processor.try_borrow_mut().ok()?;
        if !p.valid_motivator(index, &self.link) {
            return None;
        }
        let result = f(&mut p, index);
        Some(result)
    }
}

impl<P: ProcessorKind + ?Sized> Default for Motivator<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ProcessorKind + ?Sized> Drop for Motivator<P> {
    /// A busy processor reclaims the entry at the start of its next frame.
    fn drop(&mut self) {
        if self.release().is_err() {
            debug!(index = ?self.link.index(), "motivator dropped while its processor was busy");
        }
    }
}

impl<P: ProcessorKind + ?Sized> fmt::Debug for Motivator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Motivator").field("link", &self.link.state()).finish()
    }
}

// =============================================================================
// Scalar Motivator
// =============================================================================

impl Motivator<dyn ScalarProcessor> {
    pub fn value(&self) -> Option<f32> {
        self.with(|p, index| p.value(index))
    }

    pub fn velocity(&self) -> Option<f32> {
        self.with(|p, index| p.velocity(index))
    }

    pub fn target_value(&self) -> Option<f32> {
        self.with(|p, index| p.target_value(index))
    }

    pub fn target_velocity(&self) -> Option<f32> {
        self.with(|p, index| p.target_velocity(index))
    }

    pub fn difference(&self) -> Option<f32> {
        self.with(|p, index| p.difference(index))
    }

    pub fn target_time(&self) -> Option<MotiveTime> {
        self.with(|p, index| p.target_time(index))
    }

    /// Returns false if the motivator is not valid.
    pub fn set_target(&self, target: &MotiveTarget1f) -> bool {
        self.with_mut(|p, index| p.set_target(index, target)).is_some()
    }

    /// Returns false if the motivator is not valid.
    pub fn set_spline(&self, playback: &SplinePlayback) -> bool {
        self.with_mut(|p, index| p.set_spline(index, playback)).is_some()
    }

    /// Value of one slot of a multi-dimensional motivator.
    pub fn value_at(&self, dimension: MotiveDimension) -> Option<f32> {
        self.with(|p, index| (dimension < p.dimensions(index)).then(|| p.value(index + dimension)))
            .flatten()
    }

    /// Returns false if the motivator is not valid or has no such slot.
    pub fn set_target_at(&self, dimension: MotiveDimension, target: &MotiveTarget1f) -> bool {
        self.with_mut(|p, index| {
            let in_range = dimension < p.dimensions(index);
            if in_range {
                p.set_target(index + dimension, target);
            }
            in_range
        })
        .unwrap_or(false)
    }
}

// =============================================================================
// Matrix Motivator
// =============================================================================

impl Motivator<dyn MatrixProcessor> {
    pub fn value(&self) -> Option<Matrix4<f32>> {
        self.with(|p, index| p.value(index))
    }

    pub fn num_children(&self) -> Option<usize> {
        self.with(|p, index| p.num_children(index))
    }

    pub fn child_value1f(&self, child_index: MotiveChildIndex) -> Option<f32> {
        self.with(|p, index| p.child_value1f(index, child_index))
    }

    pub fn child_value3f(&self, child_index: MotiveChildIndex) -> Option<Vector3<f32>> {
        self.with(|p, index| p.child_value3f(index, child_index))
    }

    pub fn set_child_target1f(&self, child_index: MotiveChildIndex, target: &MotiveTarget1f) -> bool {
        self.with_mut(|p, index| p.set_child_target1f(index, child_index, target)).is_some()
    }

    pub fn set_child_value1f(&self, child_index: MotiveChildIndex, value: f32) -> bool {
        self.with_mut(|p, index| p.set_child_value1f(index, child_index, value)).is_some()
    }

    pub fn set_child_value3f(&self, child_index: MotiveChildIndex, value: &Vector3<f32>) -> bool {
        self.with_mut(|p, index| p.set_child_value3f(index, child_index, value)).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::processors::{LinearInit, MatrixInit, MatrixOperationInit, MatrixOperationType, LINEAR};

    fn setup() -> MotiveEngine {
        MotiveEngine::with_defaults(EngineConfig::default().with_verify_after_advance(true))
    }

    #[test]
    fn test_initialize_and_read() {
        let engine = setup();
        let mut motivator = Motivator1f::new();
        assert!(!motivator.valid());
        assert_eq!(motivator.value(), None);

        motivator.initialize(&LinearInit::new(3.0), &engine).unwrap();
        assert!(motivator.valid());
        assert_eq!(motivator.index(), Some(0));
        assert_eq!(motivator.dimensions(), Some(1));
        assert_eq!(motivator.value(), Some(3.0));
    }

    #[test]
    fn test_zero_dimensions_keeps_prior_entry() {
        let engine = setup();
        let mut motivator = Motivator1f::new();
        motivator.initialize(&LinearInit::new(1.0), &engine).unwrap();

        let err = motivator
            .initialize_with_dimensions(&LinearInit::new(2.0), &engine, 0)
            .unwrap_err();
        assert_eq!(err, MotiveError::InvalidDimensions);
        assert_eq!(motivator.value(), Some(1.0));
    }

    #[test]
    fn test_drop_removes_entry() {
        let engine = setup();
        let processor = engine.scalar_processor(LINEAR).unwrap();

        let mut motivator = Motivator1f::new();
        motivator.initialize(&LinearInit::new(1.0), &engine).unwrap();
        assert_eq!(processor.borrow().core().live_count(), 1);

        drop(motivator);
        assert_eq!(processor.borrow().core().live_count(), 0);
        processor.borrow().verify_internal_state().unwrap();
    }

    #[test]
    fn test_invalidate() {
        let engine = setup();
        let mut motivator = Motivator1f::new();
        motivator.initialize(&LinearInit::new(1.0), &engine).unwrap();

        motivator.invalidate();
        assert!(!motivator.valid());
        assert_eq!(motivator.index(), None);
        assert!(!motivator.set_target(&MotiveTarget1f::current(2.0, 0.0)));

        // Safe to repeat
        motivator.invalidate();
    }

    #[test]
    fn test_take_from() {
        let engine = setup();
        let mut source = Motivator1f::new();
        source.initialize(&LinearInit::new(4.0), &engine).unwrap();
        let index = source.index();

        let mut dest = Motivator1f::new();
        dest.take_from(&mut source);

        assert!(!source.valid());
        assert!(dest.valid());
        assert_eq!(dest.index(), index);
        assert_eq!(dest.value(), Some(4.0));

        // Dropping the old handle leaves the entry alone
        drop(source);
        assert_eq!(dest.value(), Some(4.0));
    }

    #[test]
    fn test_take_from_unbound_source() {
        let engine = setup();
        let mut dest = Motivator1f::new();
        dest.initialize(&LinearInit::new(1.0), &engine).unwrap();

        let mut source = Motivator1f::new();
        dest.take_from(&mut source);
        assert!(!dest.valid());
    }

    #[test]
    fn test_drop_while_processor_busy() {
        let engine = setup();
        let processor = engine.scalar_processor(LINEAR).unwrap();
        let mut motivator = Motivator1f::new();
        motivator.initialize(&LinearInit::new(1.0), &engine).unwrap();

        {
            let _busy = processor.borrow_mut();
            drop(motivator);
        }
        processor.borrow().verify_internal_state().unwrap();
        assert_eq!(processor.borrow().core().live_count(), 1);

        // Reclaimed on the next frame
        engine.advance_frame(16);
        assert_eq!(processor.borrow().core().live_count(), 0);
        assert_eq!(processor.borrow().core().num_indices(), 0);
        engine.verify_internal_state().unwrap();
    }

    #[test]
    fn test_invalidate_while_busy_keeps_binding() {
        let engine = setup();
        let processor = engine.scalar_processor(LINEAR).unwrap();
        let mut motivator = Motivator1f::new();
        motivator.initialize(&LinearInit::new(1.0), &engine).unwrap();

        {
            let _busy = processor.borrow_mut();
            motivator.invalidate();
        }
        assert!(motivator.valid());
        assert_eq!(motivator.value(), Some(1.0));
        processor.borrow().verify_internal_state().unwrap();

        motivator.invalidate();
        assert!(!motivator.valid());
        assert_eq!(processor.borrow().core().live_count(), 0);
    }

    #[test]
    fn test_reinitialize_while_busy_fails_cleanly() {
        let engine = setup();
        let processor = engine.scalar_processor(LINEAR).unwrap();
        let mut motivator = Motivator1f::new();
        motivator.initialize(&LinearInit::new(1.0), &engine).unwrap();

        let err = {
            let _busy = processor.borrow_mut();
            motivator.initialize(&LinearInit::new(2.0), &engine).unwrap_err()
        };
        assert_eq!(err, MotiveError::ProcessorBusy(LINEAR));
        assert_eq!(motivator.value(), Some(1.0));
        engine.verify_internal_state().unwrap();
    }

    #[test]
    fn test_take_from_while_busy_changes_nothing() {
        let engine = setup();
        let processor = engine.scalar_processor(LINEAR).unwrap();
        let mut source = Motivator1f::new();
        source.initialize(&LinearInit::new(4.0), &engine).unwrap();
        let mut dest = Motivator1f::new();

        {
            let _busy = processor.borrow_mut();
            dest.take_from(&mut source);
        }
        assert!(source.valid());
        assert!(!dest.valid());
        engine.verify_internal_state().unwrap();
    }

    #[test]
    fn test_slot_access() {
        let engine = setup();
        let mut motivator = Motivator1f::new();
        motivator
            .initialize_with_dimensions(&LinearInit::new(1.0), &engine, 2)
            .unwrap();

        assert!(motivator.set_target_at(1, &MotiveTarget1f::target(5.0, 0.0, 10)));
        engine.advance_frame(10);

        assert_eq!(motivator.value_at(0), Some(1.0));
        assert_eq!(motivator.value_at(1), Some(5.0));
        assert_eq!(motivator.value(), motivator.value_at(0));

        assert_eq!(motivator.value_at(2), None);
        assert!(!motivator.set_target_at(2, &MotiveTarget1f::current(0.0, 0.0)));
    }

    #[test]
    fn test_engine_dropped_first() {
        let engine = setup();
        let mut motivator = Motivator1f::new();
        motivator.initialize(&LinearInit::new(1.0), &engine).unwrap();

        drop(engine);
        assert!(!motivator.valid());
        assert_eq!(motivator.value(), None);
    }

    #[test]
    fn test_matrix_handle() {
        let engine = setup();
        let init = MatrixInit::new(vec![
            MatrixOperationInit::constant(MatrixOperationType::TranslateX, 1.0),
            MatrixOperationInit::constant(MatrixOperationType::TranslateY, 2.0),
            MatrixOperationInit::constant(MatrixOperationType::TranslateZ, 3.0),
        ]);

        let mut matrix = MotivatorMatrix4f::new();
        matrix.initialize(&init, &engine).unwrap();

        assert_eq!(matrix.num_children(), Some(3));
        assert_eq!(matrix.child_value3f(0), Some(Vector3::new(1.0, 2.0, 3.0)));
        let value = matrix.value().unwrap();
        assert_eq!(value[(0, 3)], 1.0);
        assert_eq!(value[(1, 3)], 2.0);
        assert_eq!(value[(2, 3)], 3.0);
    }

    #[test]
    fn test_scalar_init_on_matrix_processor_fails() {
        let engine = setup();
        let mut matrix = MotivatorMatrix4f::new();
        let err = matrix.initialize(&LinearInit::new(0.0), &engine).unwrap_err();
        assert!(matches!(err, MotiveError::WrongProcessorKind { .. }));
        assert!(!matrix.valid());
    }
}
