//! Matrix Processor - 4x4 transforms composed from scalar children.
//!
//! Each motivator holds an ordered list of operations (rotate, translate,
//! scale). Each operation is one child whose value is either a constant or
//! driven by a child [`Motivator1f`] in a scalar processor. The matrix is the
//! product of the operations in order.
//!
//! Scalar processors have lower priority, so by the time this processor
//! advances, animated children already hold this frame's values.

use std::any::Any;
use std::mem;

use nalgebra::{Matrix4, Vector3};
use tracing::trace;

use crate::engine::{
    EngineConfig, MatrixProcessor, MotiveEngine, MotiveProcessor, ProcessorCore, ProcessorHandle, ProcessorLifecycle,
};
use crate::error::{MotiveError, Result};
use crate::motivator::Motivator1f;
use crate::types::{MotiveChildIndex, MotiveIndex, MotiveTarget1f, MotiveTime, MotivatorInit, MotivatorType};

/// Type of [`MatrixMotiveProcessor`].
pub const MATRIX: MotivatorType = MotivatorType::new("matrix");

/// Runs after scalar processors so animated children are current.
pub const MATRIX_PRIORITY: i32 = 1;

// =============================================================================
// Operations
// =============================================================================

/// One step of a matrix composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixOperationType {
    /// Angle in radians.
    RotateAboutX,
    RotateAboutY,
    RotateAboutZ,
    TranslateX,
    TranslateY,
    TranslateZ,
    ScaleX,
    ScaleY,
    ScaleZ,
    ScaleUniformly,
}

impl MatrixOperationType {
    /// Value that leaves the matrix unchanged.
    pub const fn default_value(&self) -> f32 {
        match self {
            Self::ScaleX | Self::ScaleY | Self::ScaleZ | Self::ScaleUniformly => 1.0,
            _ => 0.0,
        }
    }

    /// Matrix for this operation at `value`.
    pub fn matrix(&self, value: f32) -> Matrix4<f32> {
        match self {
            Self::RotateAboutX => Matrix4::from_axis_angle(&Vector3::x_axis(), value),
            Self::RotateAboutY => Matrix4::from_axis_angle(&Vector3::y_axis(), value),
            Self::RotateAboutZ => Matrix4::from_axis_angle(&Vector3::z_axis(), value),
            Self::TranslateX => Matrix4::new_translation(&Vector3::new(value, 0.0, 0.0)),
            Self::TranslateY => Matrix4::new_translation(&Vector3::new(0.0, value, 0.0)),
            Self::TranslateZ => Matrix4::new_translation(&Vector3::new(0.0, 0.0, value)),
            Self::ScaleX => Matrix4::new_nonuniform_scaling(&Vector3::new(value, 1.0, 1.0)),
            Self::ScaleY => Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, value, 1.0)),
            Self::ScaleZ => Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, value)),
            Self::ScaleUniformly => Matrix4::new_scaling(value),
        }
    }
}

/// Where an operation's value comes from.
pub enum OperationSource {
    Constant(f32),
    /// Driven by a child scalar motivator created from this init.
    Animated(Box<dyn MotivatorInit>),
}

/// Initial state of one operation.
pub struct MatrixOperationInit {
    pub operation: MatrixOperationType,
    pub source: OperationSource,
}

impl MatrixOperationInit {
    pub fn constant(operation: MatrixOperationType, value: f32) -> Self {
        Self {
            operation,
            source: OperationSource::Constant(value),
        }
    }

    pub fn animated(operation: MatrixOperationType, init: impl MotivatorInit) -> Self {
        Self {
            operation,
            source: OperationSource::Animated(Box::new(init)),
        }
    }
}

/// Initial state of a matrix motivator.
#[derive(Default)]
pub struct MatrixInit {
    pub operations: Vec<MatrixOperationInit>,
}

impl MatrixInit {
    pub fn new(operations: Vec<MatrixOperationInit>) -> Self {
        Self { operations }
    }
}

impl MotivatorInit for MatrixInit {
    fn motivator_type(&self) -> MotivatorType {
        MATRIX
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

enum ChildValue {
    Constant(f32),
    Animated(Motivator1f),
}

struct MatrixOperation {
    kind: MatrixOperationType,
    value: ChildValue,
}

impl MatrixOperation {
    fn value(&self) -> f32 {
        match &self.value {
            ChildValue::Constant(value) => *value,
            ChildValue::Animated(child) => child.value().unwrap_or(self.kind.default_value()),
        }
    }
}

fn compose(operations: &[MatrixOperation]) -> Matrix4<f32> {
    operations
        .iter()
        .fold(Matrix4::identity(), |matrix, op| matrix * op.kind.matrix(op.value()))
}

bitflags::bitflags! {
    /// Composition state of one matrix entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntryFlags: u8 {
        /// A constant child changed since the matrix was last composed.
        const DIRTY = 1 << 0;
        /// At least one child is driven by a scalar motivator.
        const ANIMATED = 1 << 1;
    }
}

// =============================================================================
// Processor
// =============================================================================

/// Composes matrices from constant and animated children.
#[derive(Default)]
pub struct MatrixMotiveProcessor {
    core: ProcessorCore,
    operations: Vec<Vec<MatrixOperation>>,
    matrices: Vec<Matrix4<f32>>,
    flags: Vec<EntryFlags>,
}

/// Factory registered with the engine.
pub fn create(config: &EngineConfig) -> ProcessorHandle {
    ProcessorHandle::matrix(MatrixMotiveProcessor::new(config))
}

impl MatrixMotiveProcessor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            core: ProcessorCore::new().with_defragment_threshold(config.defragment_threshold),
            ..Default::default()
        }
    }

    /// Composition flags of the entry at `index`.
    pub fn flags(&self, index: MotiveIndex) -> EntryFlags {
        self.flags[index]
    }
}

impl MotiveProcessor for MatrixMotiveProcessor {
    fn core(&self) -> &ProcessorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProcessorCore {
        &mut self.core
    }

    fn advance_frame(&mut self, _delta_time: MotiveTime) {
        self.defragment_if_needed();

        for index in 0..self.core.num_indices() {
            if !self.valid_index(index) {
                continue;
            }
            let flags = self.flags[index];
            if flags.intersects(EntryFlags::DIRTY | EntryFlags::ANIMATED) {
                self.matrices[index] = compose(&self.operations[index]);
                self.flags[index].remove(EntryFlags::DIRTY);
            }
        }
    }

    fn motivator_type(&self) -> MotivatorType {
        MATRIX
    }

    fn priority(&self) -> i32 {
        MATRIX_PRIORITY
    }

    fn initialize_index(&mut self, init: &dyn MotivatorInit, index: MotiveIndex, engine: &MotiveEngine) -> Result<()> {
        let init = init.as_any().downcast_ref::<MatrixInit>().ok_or(MotiveError::WrongInit {
            expected: MATRIX,
            found: init.motivator_type(),
        })?;

        let mut operations = Vec::with_capacity(init.operations.len());
        let mut flags = EntryFlags::empty();
        for op in &init.operations {
            let value = match &op.source {
                OperationSource::Constant(value) => ChildValue::Constant(*value),
                OperationSource::Animated(child_init) => {
                    let mut child = Motivator1f::new();
                    child.initialize(child_init.as_ref(), engine)?;
                    flags |= EntryFlags::ANIMATED;
                    ChildValue::Animated(child)
                }
            };
            operations.push(MatrixOperation { kind: op.operation, value });
        }

        trace!(index, children = operations.len(), animated = flags.contains(EntryFlags::ANIMATED), "matrix initialized");
        self.matrices[index] = compose(&operations);
        self.operations[index] = operations;
        self.flags[index] = flags;
        Ok(())
    }

    fn remove_index(&mut self, index: MotiveIndex) {
        // Drops child motivators, which frees their scalar entries
        self.operations[index].clear();
        self.matrices[index] = Matrix4::identity();
        self.flags[index] = EntryFlags::empty();
    }

    fn move_index(&mut self, old_index: MotiveIndex, new_index: MotiveIndex) {
        self.operations[new_index] = mem::take(&mut self.operations[old_index]);
        self.matrices[new_index] = self.matrices[old_index];
        self.flags[new_index] = mem::take(&mut self.flags[old_index]);
    }

    fn set_num_indices(&mut self, num_indices: MotiveIndex) {
        self.operations.resize_with(num_indices, Vec::new);
        self.matrices.resize(num_indices, Matrix4::identity());
        self.flags.resize(num_indices, EntryFlags::empty());
    }

    fn payload_len(&self) -> Option<MotiveIndex> {
        Some(self.matrices.len())
    }
}

impl MatrixProcessor for MatrixMotiveProcessor {
    fn value(&self, index: MotiveIndex) -> Matrix4<f32> {
        self.matrices[index]
    }

    fn child_value1f(&self, index: MotiveIndex, child_index: MotiveChildIndex) -> f32 {
        self.operations[index][child_index].value()
    }

    fn num_children(&self, index: MotiveIndex) -> usize {
        self.operations[index].len()
    }

    fn set_child_target1f(&mut self, index: MotiveIndex, child_index: MotiveChildIndex, target: &MotiveTarget1f) {
        match &mut self.operations[index][child_index].value {
            ChildValue::Animated(child) => {
                child.set_target(target);
            }
            // Constant children jump straight to the goal
            ChildValue::Constant(value) => *value = target.goal().value,
        }
        self.flags[index] |= EntryFlags::DIRTY;
    }

    fn set_child_value1f(&mut self, index: MotiveIndex, child_index: MotiveChildIndex, value: f32) {
        match &mut self.operations[index][child_index].value {
            ChildValue::Animated(child) => {
                child.set_target(&MotiveTarget1f::current(value, 0.0));
            }
            ChildValue::Constant(constant) => *constant = value,
        }
        self.flags[index] |= EntryFlags::DIRTY;
    }
}
