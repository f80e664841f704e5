//! Motive Engine - Owns one processor per algorithm and drives them.
//!
//! - Factories registered per [`MotivatorType`]; processors are created on
//!   first use
//! - Processors kept sorted by priority (ties keep registration order)
//! - `advance_frame` runs every processor once, lowest priority first
//!
//! Processors live in `Rc<RefCell<..>>` so motivator handles can hold `Weak`
//! references to them. The engine never keeps a borrow across a call into a
//! processor, so a processor may use the engine (e.g. to create child
//! motivators) while it is being initialized.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use super::interfaces::{MatrixProcessor, ScalarProcessor};
use super::processor::{MotiveProcessor, ProcessorLifecycle};
use crate::error::{MotiveError, Result};
use crate::types::{MotiveTime, MotivatorType};

// =============================================================================
// Config
// =============================================================================

/// Engine-wide settings handed to every processor factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Run [`ProcessorLifecycle::verify_internal_state`] after every
    /// processor's frame and panic on the first inconsistency.
    pub verify_after_advance: bool,

    /// Free indices a processor tolerates before compacting in its frame.
    /// 0 compacts whenever anything was freed.
    pub defragment_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verify_after_advance: cfg!(debug_assertions),
            defragment_threshold: 0,
        }
    }
}

impl EngineConfig {
    pub fn with_verify_after_advance(mut self, verify: bool) -> Self {
        self.verify_after_advance = verify;
        self
    }

    pub fn with_defragment_threshold(mut self, threshold: usize) -> Self {
        self.defragment_threshold = threshold;
        self
    }
}

// =============================================================================
// Processor Handle
// =============================================================================

/// A processor as stored by the engine, tagged with its value interface.
#[derive(Clone)]
pub enum ProcessorHandle {
    Scalar(Rc<RefCell<dyn ScalarProcessor>>),
    Matrix(Rc<RefCell<dyn MatrixProcessor>>),
}

impl ProcessorHandle {
    pub fn scalar<P: ScalarProcessor + 'static>(processor: P) -> Self {
        Self::Scalar(Rc::new(RefCell::new(processor)))
    }

    pub fn matrix<P: MatrixProcessor + 'static>(processor: P) -> Self {
        Self::Matrix(Rc::new(RefCell::new(processor)))
    }

    pub fn motivator_type(&self) -> MotivatorType {
        match self {
            Self::Scalar(p) => p.borrow().motivator_type(),
            Self::Matrix(p) => p.borrow().motivator_type(),
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            Self::Scalar(p) => p.borrow().priority(),
            Self::Matrix(p) => p.borrow().priority(),
        }
    }

    /// Number of live motivators.
    pub fn live_count(&self) -> usize {
        match self {
            Self::Scalar(p) => p.borrow().core().live_count(),
            Self::Matrix(p) => p.borrow().core().live_count(),
        }
    }

    fn advance_frame(&self, delta_time: MotiveTime) {
        match self {
            Self::Scalar(p) => {
                p.borrow_mut().remove_orphaned_motivators();
                p.borrow_mut().advance_frame(delta_time);
            }
            Self::Matrix(p) => {
                p.borrow_mut().remove_orphaned_motivators();
                p.borrow_mut().advance_frame(delta_time);
            }
        }
    }

    pub fn verify_internal_state(&self) -> Result<()> {
        match self {
            Self::Scalar(p) => p.borrow().verify_internal_state(),
            Self::Matrix(p) => p.borrow().verify_internal_state(),
        }
    }
}

/// Creates a processor for the engine.
pub type ProcessorFactory = fn(&EngineConfig) -> ProcessorHandle;

struct RegisteredProcessor {
    motivator_type: MotivatorType,
    priority: i32,
    handle: ProcessorHandle,
}

// =============================================================================
// Engine
// =============================================================================

/// Owner of all processors for one simulation.
pub struct MotiveEngine {
    config: EngineConfig,
    factories: HashMap<MotivatorType, ProcessorFactory>,
    /// Instantiated processors, sorted by priority.
    processors: RefCell<Vec<RegisteredProcessor>>,
}

impl Default for MotiveEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl MotiveEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            factories: HashMap::new(),
            processors: RefCell::new(Vec::new()),
        }
    }

    /// Engine with the built-in linear and matrix processors registered.
    pub fn with_defaults(config: EngineConfig) -> Self {
        let mut engine = Self::new(config);
        crate::processors::register_defaults(&mut engine);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register how to create the processor for `motivator_type`.
    pub fn register_factory(&mut self, motivator_type: MotivatorType, factory: ProcessorFactory) -> Result<()> {
        if self.factories.contains_key(&motivator_type) || self.find(motivator_type).is_some() {
            return Err(MotiveError::DuplicateProcessor(motivator_type));
        }
        self.factories.insert(motivator_type, factory);
        debug!(%motivator_type, "processor factory registered");
        Ok(())
    }

    /// Register an already constructed processor.
    pub fn register_processor(&mut self, handle: ProcessorHandle) -> Result<()> {
        let motivator_type = handle.motivator_type();
        if self.factories.contains_key(&motivator_type) || self.find(motivator_type).is_some() {
            return Err(MotiveError::DuplicateProcessor(motivator_type));
        }
        self.insert(handle);
        Ok(())
    }

    /// The processor for `motivator_type`, created from its factory if needed.
    pub fn processor(&self, motivator_type: MotivatorType) -> Result<ProcessorHandle> {
        if let Some(handle) = self.find(motivator_type) {
            return Ok(handle);
        }
        let factory = self
            .factories
            .get(&motivator_type)
            .ok_or(MotiveError::ProcessorNotRegistered(motivator_type))?;
        let handle = factory(&self.config);
        self.insert(handle.clone());
        Ok(handle)
    }

    /// The processor for `motivator_type`, if it drives scalar motivators.
    pub fn scalar_processor(&self, motivator_type: MotivatorType) -> Result<Rc<RefCell<dyn ScalarProcessor>>> {
        match self.processor(motivator_type)? {
            ProcessorHandle::Scalar(p) => Ok(p),
            ProcessorHandle::Matrix(_) => Err(MotiveError::WrongProcessorKind {
                expected: "scalar",
                found: motivator_type,
            }),
        }
    }

    /// The processor for `motivator_type`, if it drives matrix motivators.
    pub fn matrix_processor(&self, motivator_type: MotivatorType) -> Result<Rc<RefCell<dyn MatrixProcessor>>> {
        match self.processor(motivator_type)? {
            ProcessorHandle::Matrix(p) => Ok(p),
            ProcessorHandle::Scalar(_) => Err(MotiveError::WrongProcessorKind {
                expected: "matrix",
                found: motivator_type,
            }),
        }
    }

    /// Types of the instantiated processors, in update order.
    pub fn processor_types(&self) -> Vec<MotivatorType> {
        self.processors.borrow().iter().map(|p| p.motivator_type).collect()
    }

    /// Advance every processor by `delta_time`, lowest priority first.
    ///
    /// Panics if `verify_after_advance` is set and a processor's state is
    /// inconsistent after its frame.
    pub fn advance_frame(&self, delta_time: MotiveTime) {
        trace!(delta_time, "advance frame");
        for handle in self.ordered_handles() {
            handle.advance_frame(delta_time);
            if self.config.verify_after_advance {
                if let Err(err) = handle.verify_internal_state() {
                    panic!("processor {} corrupted its state: {err}", handle.motivator_type());
                }
            }
        }
    }

    /// Verify every instantiated processor.
    pub fn verify_internal_state(&self) -> Result<()> {
        for handle in self.ordered_handles() {
            handle.verify_internal_state()?;
        }
        Ok(())
    }

    fn find(&self, motivator_type: MotivatorType) -> Option<ProcessorHandle> {
        self.processors
            .borrow()
            .iter()
            .find(|p| p.motivator_type == motivator_type)
            .map(|p| p.handle.clone())
    }

    fn insert(&self, handle: ProcessorHandle) {
        let motivator_type = handle.motivator_type();
        let priority = handle.priority();
        let mut processors = self.processors.borrow_mut();
        let pos = processors.partition_point(|p| p.priority <= priority);
        processors.insert(
            pos,
            RegisteredProcessor {
                motivator_type,
                priority,
                handle,
            },
        );
        debug!(%motivator_type, priority, "processor created");
    }

    /// Snapshot so no borrow of the list is held while processors run.
    fn ordered_handles(&self) -> Vec<ProcessorHandle> {
        self.processors.borrow().iter().map(|p| p.handle.clone()).collect()
    }
}
