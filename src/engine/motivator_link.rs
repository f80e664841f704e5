//! Motivator Link - The binding between a handle and its processor entry.
//!
//! A link records which processor and index a motivator handle currently
//! references. The handle and the processor share the link through an `Rc`:
//! the processor rewrites it when the entry moves, clears it when the entry
//! is removed, and compares it by identity to reject stale handles.

use std::cell::Cell;

use crate::types::{MotiveDimension, MotiveIndex, ProcessorId};

/// Where a bound link points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    pub processor: ProcessorId,
    pub index: MotiveIndex,
    pub dimensions: MotiveDimension,
}

/// Non-owning reference from a motivator handle into a processor.
#[derive(Debug, Default)]
pub struct MotivatorLink {
    state: Cell<Option<LinkState>>,
}

impl MotivatorLink {
    /// Create an unbound link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the link at an entry.
    pub fn bind(&self, state: LinkState) {
        self.state.set(Some(state));
    }

    /// Unbind the link.
    pub fn clear(&self) {
        self.state.set(None);
    }

    /// Rewrite only the index, after the entry moved.
    pub fn set_index(&self, index: MotiveIndex) {
        if let Some(state) = self.state.get() {
            self.state.set(Some(LinkState { index, ..state }));
        }
    }

    pub fn state(&self) -> Option<LinkState> {
        self.state.get()
    }

    pub fn is_bound(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn index(&self) -> Option<MotiveIndex> {
        self.state.get().map(|state| state.index)
    }

    pub fn processor(&self) -> Option<ProcessorId> {
        self.state.get().map(|state| state.processor)
    }

    pub fn dimensions(&self) -> Option<MotiveDimension> {
        self.state.get().map(|state| state.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_and_clear() {
        let link = MotivatorLink::new();
        assert!(!link.is_bound());
        assert_eq!(link.index(), None);

        let processor = ProcessorId::next();
        link.bind(LinkState { processor, index: 4, dimensions: 2 });
        assert_eq!(link.index(), Some(4));
        assert_eq!(link.processor(), Some(processor));
        assert_eq!(link.dimensions(), Some(2));

        link.clear();
        assert!(!link.is_bound());
        assert_eq!(link.dimensions(), None);
    }

    #[test]
    fn test_set_index_keeps_owner() {
        let link = MotivatorLink::new();
        let processor = ProcessorId::next();
        link.bind(LinkState { processor, index: 4, dimensions: 3 });

        link.set_index(1);
        assert_eq!(
            link.state(),
            Some(LinkState { processor, index: 1, dimensions: 3 })
        );
    }

    #[test]
    fn test_set_index_on_unbound_link() {
        let link = MotivatorLink::new();
        link.set_index(7);
        assert!(!link.is_bound());
    }
}
