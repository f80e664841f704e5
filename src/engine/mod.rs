//! Motive Engine - Index allocation, processors, and the engine that runs them.
//!
//! - IndexAllocator: Contiguous runs of indices, reuse and defragmentation
//! - MotivatorLink: Shared binding between a handle and its processor entry
//! - Processor: Shared lifecycle every algorithm gets for free
//! - Interfaces: Scalar and matrix value surfaces
//! - MotiveEngine: Processor registry and frame loop
//!
//! # Architecture
//!
//! Motivators are NOT objects holding their data. They are indices into the
//! parallel arrays of one processor:
//!
//! ```text
//! Index 0: value=0.5  velocity=0.1  target=1.0  link=fade
//! Index 1: value=3.0  velocity=0.0  target=3.0  link=slide[0]
//! Index 2: value=4.0  velocity=0.0  target=4.0  link=slide[1]
//! ```
//!
//! Each processor advances all of its entries in one tight loop. When entries
//! move during defragmentation the owning handle's link is updated in place.

mod index_allocator;
mod interfaces;
mod motivator_link;
mod motive_engine;
mod processor;

pub use index_allocator::*;
pub use interfaces::*;
pub use motivator_link::*;
pub use motive_engine::*;
pub use processor::*;
