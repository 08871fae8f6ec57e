//! The element registry: the single source of truth for element existence.

use indexmap::IndexMap;

use crate::{element::Element, error::CanvasError, identifier::Id};

/// Maps ids to live elements.
///
/// Lookups return `Option`; only mutations fail. The registry never cascades:
/// detaching dependents before removal is the caller's job.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    elements: IndexMap<Id, Element>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an element under its own id.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::DuplicateId`] if the id is already registered.
    pub fn add(&mut self, element: Element) -> Result<(), CanvasError> {
        let id = element.id();
        if self.elements.contains_key(&id) {
            return Err(CanvasError::DuplicateId(id));
        }
        self.elements.insert(id, element);
        Ok(())
    }

    pub fn get(&self, id: Id) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: Id) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    /// Like [`get`](Self::get), for callers that cannot continue without the
    /// element.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] if the id is not registered.
    pub fn require(&self, id: Id) -> Result<&Element, CanvasError> {
        self.elements.get(&id).ok_or(CanvasError::NotFound(id))
    }

    pub(crate) fn require_mut(&mut self, id: Id) -> Result<&mut Element, CanvasError> {
        self.elements.get_mut(&id).ok_or(CanvasError::NotFound(id))
    }

    /// Unregisters an element and hands it back.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] if the id is not registered.
    pub fn remove(&mut self, id: Id) -> Result<Element, CanvasError> {
        self.elements
            .shift_remove(&id)
            .ok_or(CanvasError::NotFound(id))
    }

    pub fn contains(&self, id: Id) -> bool {
        self.elements.contains_key(&id)
    }

    /// Snapshot of every registered element.
    pub fn all(&self) -> Vec<&Element> {
        self.elements.values().collect()
    }

    /// Snapshot of every registered id.
    pub fn ids(&self) -> Vec<Id> {
        self.elements.keys().copied().collect()
    }

    /// Elements matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&Element) -> bool) -> Vec<&Element> {
        self.elements
            .values()
            .filter(|element| predicate(element))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.elements.clear();
    }
}
