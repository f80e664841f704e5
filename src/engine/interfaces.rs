//! Typed processor interfaces.
//!
//! Every processor is a [`MotiveProcessor`]. These traits add the value
//! surface for the two kinds of motivator handles:
//! - [`ScalarProcessor`] drives single `f32` values (`Motivator1f`).
//! - [`MatrixProcessor`] drives 4x4 matrices composed from scalar children
//!   (`MotivatorMatrix4f`).
//!
//! Neither adds lifecycle rules.

use nalgebra::{Matrix4, Vector3};

use super::processor::MotiveProcessor;
use crate::types::{MotiveChildIndex, MotiveIndex, MotiveTarget1f, MotiveTime, SplinePlayback};

// =============================================================================
// Scalar
// =============================================================================

/// Interface for processors that drive a single float value per motivator.
pub trait ScalarProcessor: MotiveProcessor {
    fn value(&self, index: MotiveIndex) -> f32;
    fn velocity(&self, index: MotiveIndex) -> f32;
    fn target_value(&self, index: MotiveIndex) -> f32;
    fn target_velocity(&self, index: MotiveIndex) -> f32;
    fn difference(&self, index: MotiveIndex) -> f32;
    fn target_time(&self, index: MotiveIndex) -> MotiveTime;

    // At least one of these should be implemented. Otherwise nothing can
    // drive the motivator toward a goal.
    fn set_target(&mut self, _index: MotiveIndex, _target: &MotiveTarget1f) {}
    fn set_spline(&mut self, _index: MotiveIndex, _playback: &SplinePlayback) {}
}

// =============================================================================
// Matrix
// =============================================================================

/// Interface for processors that drive a 4x4 float matrix per motivator.
pub trait MatrixProcessor: MotiveProcessor {
    /// Current composed matrix.
    fn value(&self, index: MotiveIndex) -> Matrix4<f32>;

    /// Current value of one child component.
    fn child_value1f(&self, index: MotiveIndex, child_index: MotiveChildIndex) -> f32;

    /// Three consecutive children packed into a vector.
    fn child_value3f(&self, index: MotiveIndex, child_index: MotiveChildIndex) -> Vector3<f32> {
        Vector3::new(
            self.child_value1f(index, child_index),
            self.child_value1f(index, child_index + 1),
            self.child_value1f(index, child_index + 2),
        )
    }

    /// Number of child components of the matrix at `index`.
    fn num_children(&self, index: MotiveIndex) -> usize;

    fn set_child_target1f(&mut self, _index: MotiveIndex, _child_index: MotiveChildIndex, _target: &MotiveTarget1f) {}

    fn set_child_value1f(&mut self, _index: MotiveIndex, _child_index: MotiveChildIndex, _value: f32) {}

    fn set_child_value3f(&mut self, index: MotiveIndex, child_index: MotiveChildIndex, value: &Vector3<f32>) {
        for (offset, component) in value.iter().enumerate() {
            self.set_child_value1f(index, child_index + offset, *component);
        }
    }
}
