//! Generic execute/undo/redo engine.
//!
//! The stack knows nothing about diagrams. It runs named [`CommandHandler`]s
//! against a target `T` with a context value `C`, records one entry per
//! executed command, and groups entries into transactions that undo and redo
//! as a unit.
//!
//! # Handler lifecycle
//!
//! ```text
//! execute(name, context)
//!     ↓ pre_execute   (may execute further commands)
//!     ↓ execute       (mutates the target, entry recorded)
//!     ↓ post_execute  (may execute further commands)
//! ```
//!
//! Commands executed from `pre_execute` or `post_execute` join the
//! transaction of the outermost call.
//!
//! # Re-exports
//!
//! - [`CommandStack`] - The history and execution engine
//! - [`StackState`] - Whether the stack is idle, executing or reverting

mod stack;

use canopy_core::identifier::Id;

use crate::error::Result;

pub use stack::{CommandStack, StackState};

/// Something the stack can ask whether an element still exists.
///
/// Used to decide which touched elements get an `element.changed` event at
/// the end of an operation.
pub trait Tracked {
    fn is_live(&self, id: Id) -> bool;
}

/// A named, reversible operation on a target `T`.
///
/// `execute` and `revert` must validate before they mutate: the stack never
/// rolls back a partially applied handler. Both return the elements they
/// touched.
pub trait CommandHandler<T, C> {
    /// Runs before `execute`. Nested commands executed here are recorded
    /// before this command's own entry.
    fn pre_execute(&self, _context: &mut C, _scope: &mut Scope<'_, T, C>) -> Result<()> {
        Ok(())
    }

    /// Applies the command. Anything `revert` needs goes into `context`.
    fn execute(&self, context: &mut C, target: &mut T) -> Result<Vec<Id>>;

    /// Reverses a previous `execute` with the same context.
    fn revert(&self, context: &C, target: &mut T) -> Result<Vec<Id>>;

    /// Runs after `execute`. Nested commands executed here are recorded after
    /// this command's own entry.
    fn post_execute(&self, _context: &mut C, _scope: &mut Scope<'_, T, C>) -> Result<()> {
        Ok(())
    }
}

/// Access handed to `pre_execute` and `post_execute`.
///
/// Gives read access to the target and lets the hook execute nested
/// commands inside the current transaction.
pub struct Scope<'a, T, C> {
    stack: &'a mut CommandStack<T, C>,
    target: &'a mut T,
}

impl<'a, T, C> Scope<'a, T, C>
where
    T: Tracked,
    C: Clone,
{
    pub(crate) fn new(stack: &'a mut CommandStack<T, C>, target: &'a mut T) -> Self {
        Self { stack, target }
    }

    pub fn target(&self) -> &T {
        self.target
    }

    /// Executes a nested command in the current transaction and returns its
    /// final context.
    ///
    /// # Errors
    ///
    /// Propagates the nested command's error. The outermost call then reverts
    /// the whole transaction.
    pub fn execute(&mut self, command: &str, context: C) -> Result<C> {
        self.stack.execute(self.target, command, context)
    }
}
