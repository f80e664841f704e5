//! # spark-motive
//!
//! Data-oriented animation engine for Rust.
//!
//! ## Architecture
//!
//! spark-motive uses a parallel arrays (ECS-style) architecture: animated
//! values are indices into columnar arrays owned by a processor, one processor
//! per animation algorithm. Users hold lightweight [`Motivator`] handles that
//! follow their entry when the processor compacts its arrays.
//!
//! ```text
//! Motivator1f ──link──▶ LinearProcessor[index] ◀── MotiveEngine::advance_frame
//! ```
//!
//! Each frame the engine advances every processor once, in priority order, so
//! processors that read other processors' outputs (matrices built from scalar
//! children) see values from the same frame.
//!
//! ## Modules
//!
//! - [`types`] - Core types (MotiveIndex, MotivatorType, targets, splines)
//! - [`error`] - MotiveError and Result
//! - [`engine`] - Index allocator, processor lifecycle, engine
//! - [`motivator`] - Motivator handles
//! - [`processors`] - Built-in linear and matrix processors

pub mod engine;
pub mod error;
pub mod motivator;
pub mod processors;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use error::{MotiveError, Result};

pub use engine::{
    AllocatorEvent, EngineConfig, IndexAllocator, MatrixProcessor, MotiveEngine, MotiveProcessor, MotivatorLink,
    ProcessorCore, ProcessorFactory, ProcessorHandle, ProcessorLifecycle, ScalarProcessor,
};

pub use motivator::{Motivator, Motivator1f, MotivatorMatrix4f, ProcessorKind};
