//! Motive errors

use thiserror::Error;

use crate::types::{MotiveIndex, MotivatorType, ProcessorId};

/// Motive result type
pub type Result<T> = std::result::Result<T, MotiveError>;

/// Errors from processor lifecycle, engine registration and state verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MotiveError {
    #[error("motivator must occupy at least one index")]
    InvalidDimensions,

    #[error("index {index} is not live in processor {processor}")]
    InvalidIndex { processor: ProcessorId, index: MotiveIndex },

    #[error("no processor registered for type {0}")]
    ProcessorNotRegistered(MotivatorType),

    #[error("a processor is already registered for type {0}")]
    DuplicateProcessor(MotivatorType),

    #[error("processor for type {0} is already borrowed")]
    ProcessorBusy(MotivatorType),

    #[error("init for type {found} passed to processor of type {expected}")]
    WrongInit { expected: MotivatorType, found: MotivatorType },

    #[error("processor for type {found} cannot drive a {expected} motivator")]
    WrongProcessorKind { expected: &'static str, found: MotivatorType },

    #[error("inconsistent state in processor {processor} at index {index}: {message}")]
    Inconsistent {
        processor: ProcessorId,
        index: MotiveIndex,
        message: String,
    },
}
