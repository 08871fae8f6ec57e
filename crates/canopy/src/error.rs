//! Error types for modeling operations.
//!
//! This module provides [`ModelingError`], which wraps the structural
//! [`CanvasError`] raised by the element graph and adds the failures of the
//! command stack and the modeling handlers.

use thiserror::Error;

use canopy_core::CanvasError;

/// The main error type for Canopy editing operations.
///
/// A returned error means the operation left no trace: the command stack
/// reverts whatever part of the transaction had already run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelingError {
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("command `{0}` is already registered")]
    DuplicateCommand(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("command `{command}` received a context of the wrong kind")]
    ContextMismatch { command: String },
}

impl ModelingError {
    /// Create a new `InvalidOperation` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

/// Result alias for modeling operations.
pub type Result<T> = std::result::Result<T, ModelingError>;
