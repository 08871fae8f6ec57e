//! Error types for element graph operations.
//!
//! A missing element on a plain lookup is not an error: registry and canvas
//! getters return `Option`. [`CanvasError`] is reserved for rejected mutations
//! and for lookups the operation cannot continue without.

use thiserror::Error;

use crate::{element::ElementKind, identifier::Id};

/// Structural errors raised by the registry and the canvas.
///
/// Every operation returning this error has validated its input before
/// mutating anything, so a failed call leaves the graph unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CanvasError {
    #[error("element `{0}` not found")]
    NotFound(Id),

    #[error("element `{0}` is already registered")]
    DuplicateId(Id),

    #[error("`{parent}` cannot contain {kind} `{element}`: {reason}")]
    InvalidParent {
        element: Id,
        kind: ElementKind,
        parent: Id,
        reason: String,
    },

    #[error("moving `{element}` under `{parent}` would create a cycle")]
    CycleDetected { element: Id, parent: Id },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl CanvasError {
    pub(crate) fn invalid_parent(
        element: Id,
        kind: ElementKind,
        parent: Id,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParent {
            element,
            kind,
            parent,
            reason: reason.into(),
        }
    }
}
