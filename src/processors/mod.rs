//! Built-in processors.
//!
//! - [`linear`] - Scalars moving at constant velocity toward a target, or
//!   playing back a piecewise-linear curve
//! - [`matrix`] - 4x4 matrices composed from constant or animated children
//!
//! [`register_defaults`] installs both factories in an engine.

pub mod linear;
pub mod matrix;

pub use linear::{LinearInit, LinearProcessor, LINEAR, LINEAR_PRIORITY};
pub use matrix::{
    EntryFlags, MatrixInit, MatrixMotiveProcessor, MatrixOperationInit, MatrixOperationType, OperationSource, MATRIX,
    MATRIX_PRIORITY,
};

use tracing::warn;

use crate::engine::{MotiveEngine, ProcessorFactory};
use crate::types::MotivatorType;

/// Register the factories of every built-in processor.
///
/// Types the engine already knows are left as they are.
pub fn register_defaults(engine: &mut MotiveEngine) {
    let defaults: [(MotivatorType, ProcessorFactory); 2] = [(LINEAR, linear::create), (MATRIX, matrix::create)];
    for (motivator_type, factory) in defaults {
        if let Err(err) = engine.register_factory(motivator_type, factory) {
            warn!(%motivator_type, %err, "built-in processor not registered");
        }
    }
}
