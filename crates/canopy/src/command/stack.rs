//! The command history.

use std::{collections::HashMap, rc::Rc};

use indexmap::IndexSet;
use log::{debug, trace, warn};

use canopy_core::{
    event::{Event, EventBus},
    identifier::Id,
};

use super::{CommandHandler, Scope, Tracked};
use crate::error::{ModelingError, Result};

/// What the stack is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackState {
    #[default]
    Idle,
    Executing,
    Reverting,
}

#[derive(Debug, Clone)]
struct Entry<C> {
    command: String,
    context: C,
    transaction: u64,
}

/// Ordered command entries plus a cursor.
///
/// Entries before the cursor are undoable, entries at or after it are
/// redoable. A new outermost `execute` discards the redoable tail.
pub struct CommandStack<T, C> {
    handlers: HashMap<String, Rc<dyn CommandHandler<T, C>>>,
    entries: Vec<Entry<C>>,
    cursor: usize,
    /// Nesting level of `execute` calls. Zero means idle.
    depth: usize,
    state: StackState,
    next_transaction: u64,
    /// First entry of the transaction being executed.
    transaction_start: usize,
    max_transactions: Option<usize>,
    dirty: IndexSet<Id>,
    events: EventBus,
}

impl<T, C> CommandStack<T, C>
where
    T: Tracked,
    C: Clone,
{
    pub fn new(events: EventBus) -> Self {
        Self {
            handlers: HashMap::new(),
            entries: Vec::new(),
            cursor: 0,
            depth: 0,
            state: StackState::Idle,
            next_transaction: 0,
            transaction_start: 0,
            max_transactions: None,
            dirty: IndexSet::new(),
            events,
        }
    }

    /// Keeps at most `max` transactions, dropping the oldest first.
    pub fn with_max_transactions(mut self, max: Option<usize>) -> Self {
        self.max_transactions = max;
        self
    }

    /// Registers `handler` under `command`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelingError::DuplicateCommand`] if the name is taken.
    pub fn register(
        &mut self,
        command: &str,
        handler: impl CommandHandler<T, C> + 'static,
    ) -> Result<()> {
        if self.handlers.contains_key(command) {
            return Err(ModelingError::DuplicateCommand(command.to_string()));
        }
        self.handlers.insert(command.to_string(), Rc::new(handler));
        trace!(command; "Command registered");
        Ok(())
    }

    pub fn is_registered(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    pub fn state(&self) -> StackState {
        self.state
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// Number of recorded entries, undone ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded transactions, undone ones included.
    pub fn transaction_count(&self) -> usize {
        let mut count = 0;
        let mut last = None;
        for entry in &self.entries {
            if last != Some(entry.transaction) {
                count += 1;
                last = Some(entry.transaction);
            }
        }
        count
    }

    /// Executes `command` and returns its final context.
    ///
    /// Called at the top level this opens a new transaction. Called through a
    /// [`Scope`] it joins the current one.
    ///
    /// # Errors
    ///
    /// - [`ModelingError::UnknownCommand`] if nothing is registered under
    ///   `command`.
    /// - [`ModelingError::InvalidOperation`] while an undo or redo is running.
    /// - Any handler error. A failed outermost call reverts every entry its
    ///   transaction had recorded, leaving target and history unchanged.
    pub fn execute(&mut self, target: &mut T, command: &str, context: C) -> Result<C> {
        let handler = self.handler(command)?;
        if self.state == StackState::Reverting {
            return Err(ModelingError::invalid(format!(
                "cannot execute `{command}` while reverting"
            )));
        }

        let outermost = self.depth == 0;
        if outermost {
            self.entries.truncate(self.cursor);
            self.next_transaction += 1;
            self.transaction_start = self.entries.len();
            self.dirty.clear();
            self.state = StackState::Executing;
            debug!(command; "Executing command");
        } else {
            trace!(command, depth = self.depth; "Executing nested command");
        }

        self.depth += 1;
        let result = self.run(handler.as_ref(), target, command, context);
        self.depth -= 1;

        if outermost {
            self.state = StackState::Idle;
            match &result {
                Ok(_) => {
                    self.cursor = self.entries.len();
                    self.enforce_limit();
                    self.flush(target);
                }
                Err(err) => {
                    debug!(command, err:%; "Command failed, rolling back transaction");
                    self.rollback(target);
                }
            }
        }
        result
    }

    fn run(
        &mut self,
        handler: &dyn CommandHandler<T, C>,
        target: &mut T,
        command: &str,
        mut context: C,
    ) -> Result<C> {
        handler.pre_execute(&mut context, &mut Scope::new(self, target))?;

        let elements = handler.execute(&mut context, target)?;
        let index = self.entries.len();
        self.entries.push(Entry {
            command: command.to_string(),
            context: context.clone(),
            transaction: self.next_transaction,
        });
        self.cursor = self.entries.len();
        self.dirty.extend(elements.iter().copied());
        self.events.emit(&Event::CommandExecuted {
            command: command.to_string(),
            elements,
        });

        handler.post_execute(&mut context, &mut Scope::new(self, target))?;
        self.entries[index].context = context.clone();
        Ok(context)
    }

    /// Reverts the entries of the failed transaction, newest first.
    fn rollback(&mut self, target: &mut T) {
        while self.entries.len() > self.transaction_start {
            let Some(entry) = self.entries.pop() else {
                break;
            };
            match self.revert_entry(&entry, target) {
                Ok(()) => {}
                Err(err) => {
                    warn!(command = entry.command.as_str(), err:%; "Rollback step failed");
                }
            }
        }
        self.cursor = self.entries.len();
        self.dirty.clear();
    }

    /// Reverts the last transaction. Returns `false` at the start of history.
    ///
    /// # Errors
    ///
    /// Propagates handler errors. The entries reverted so far stay reverted.
    pub fn undo(&mut self, target: &mut T) -> Result<bool> {
        self.ensure_idle("undo")?;
        let Some(transaction) = self.cursor.checked_sub(1).map(|i| self.entries[i].transaction)
        else {
            return Ok(false);
        };

        self.state = StackState::Reverting;
        self.dirty.clear();
        let result = self.undo_transaction(transaction, target);
        self.state = StackState::Idle;
        result?;

        debug!(transaction; "Transaction undone");
        self.flush(target);
        Ok(true)
    }

    fn undo_transaction(&mut self, transaction: u64, target: &mut T) -> Result<()> {
        while self.cursor > 0 && self.entries[self.cursor - 1].transaction == transaction {
            let entry = self.entries[self.cursor - 1].clone();
            self.revert_entry(&entry, target)?;
            self.cursor -= 1;
        }
        Ok(())
    }

    fn revert_entry(&mut self, entry: &Entry<C>, target: &mut T) -> Result<()> {
        let handler = self.handler(&entry.command)?;
        let elements = handler.revert(&entry.context, target)?;
        self.dirty.extend(elements.iter().copied());
        self.events.emit(&Event::CommandReverted {
            command: entry.command.clone(),
            elements,
        });
        Ok(())
    }

    /// Re-applies the next transaction. Returns `false` at the end of history.
    ///
    /// Only `execute` runs again. Pre and post hooks already recorded their
    /// nested commands as entries of their own.
    ///
    /// # Errors
    ///
    /// Propagates handler errors. The entries redone so far stay applied.
    pub fn redo(&mut self, target: &mut T) -> Result<bool> {
        self.ensure_idle("redo")?;
        let Some(transaction) = self.entries.get(self.cursor).map(|e| e.transaction) else {
            return Ok(false);
        };

        self.state = StackState::Executing;
        self.dirty.clear();
        let result = self.redo_transaction(transaction, target);
        self.state = StackState::Idle;
        result?;

        debug!(transaction; "Transaction redone");
        self.flush(target);
        Ok(true)
    }

    fn redo_transaction(&mut self, transaction: u64, target: &mut T) -> Result<()> {
        while self
            .entries
            .get(self.cursor)
            .is_some_and(|entry| entry.transaction == transaction)
        {
            let command = self.entries[self.cursor].command.clone();
            let handler = self.handler(&command)?;
            let elements = handler.execute(&mut self.entries[self.cursor].context, target)?;
            self.cursor += 1;
            self.dirty.extend(elements.iter().copied());
            self.events
                .emit(&Event::CommandExecuted { command, elements });
        }
        Ok(())
    }

    /// Drops the whole history.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.dirty.clear();
        self.events.emit(&Event::StackChanged);
    }

    fn handler(&self, command: &str) -> Result<Rc<dyn CommandHandler<T, C>>> {
        self.handlers
            .get(command)
            .cloned()
            .ok_or_else(|| ModelingError::UnknownCommand(command.to_string()))
    }

    fn ensure_idle(&self, operation: &str) -> Result<()> {
        if self.state == StackState::Idle {
            Ok(())
        } else {
            Err(ModelingError::invalid(format!(
                "cannot {operation} while the stack is {:?}",
                self.state
            )))
        }
    }

    fn enforce_limit(&mut self) {
        let Some(max) = self.max_transactions else {
            return;
        };
        let mut excess = self.transaction_count().saturating_sub(max);
        while excess > 0 {
            let Some(oldest) = self.entries.first().map(|entry| entry.transaction) else {
                break;
            };
            let drop = self
                .entries
                .iter()
                .take_while(|entry| entry.transaction == oldest)
                .count();
            self.entries.drain(..drop);
            self.cursor = self.cursor.saturating_sub(drop);
            excess -= 1;
        }
    }

    /// Emits `element.changed` for every touched element that survived the
    /// operation, then `commandStack.changed`.
    fn flush(&mut self, target: &T) {
        for id in self.dirty.drain(..) {
            if target.is_live(id) {
                self.events.emit(&Event::ElementChanged(id));
            }
        }
        self.events.emit(&Event::StackChanged);
    }
}

impl<T, C> std::fmt::Debug for CommandStack<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut commands: Vec<&String> = self.handlers.keys().collect();
        commands.sort();
        f.debug_struct("CommandStack")
            .field("commands", &commands)
            .field("entries", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    /// A list of ids standing in for a diagram.
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Items(Vec<Id>);

    impl Tracked for Items {
        fn is_live(&self, id: Id) -> bool {
            self.0.contains(&id)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Ctx {
        item: String,
        /// Commands to run in `post_execute`.
        then: Vec<(String, String)>,
    }

    fn ctx(item: &str) -> Ctx {
        Ctx {
            item: item.to_string(),
            then: Vec::new(),
        }
    }

    struct Push;

    impl CommandHandler<Items, Ctx> for Push {
        fn execute(&self, context: &mut Ctx, target: &mut Items) -> Result<Vec<Id>> {
            let id = Id::new(&context.item);
            if target.0.contains(&id) {
                return Err(ModelingError::invalid(format!("{id} exists")));
            }
            target.0.push(id);
            Ok(vec![id])
        }

        fn revert(&self, context: &Ctx, target: &mut Items) -> Result<Vec<Id>> {
            let id = Id::new(&context.item);
            target.0.retain(|item| *item != id);
            Ok(vec![id])
        }

        fn post_execute(&self, context: &mut Ctx, scope: &mut Scope<'_, Items, Ctx>) -> Result<()> {
            for (command, item) in context.then.clone() {
                scope.execute(&command, ctx(&item))?;
            }
            Ok(())
        }
    }

    struct Fail;

    impl CommandHandler<Items, Ctx> for Fail {
        fn execute(&self, _context: &mut Ctx, _target: &mut Items) -> Result<Vec<Id>> {
            Err(ModelingError::invalid("always fails"))
        }

        fn revert(&self, _context: &Ctx, _target: &mut Items) -> Result<Vec<Id>> {
            Ok(Vec::new())
        }
    }

    fn stack() -> CommandStack<Items, Ctx> {
        let mut stack = CommandStack::new(EventBus::new());
        stack.register("push", Push).unwrap();
        stack.register("fail", Fail).unwrap();
        stack
    }

    fn items(names: &[&str]) -> Items {
        Items(names.iter().map(|name| Id::new(name)).collect())
    }

    #[test]
    fn test_register_twice_fails() {
        let mut stack = stack();
        assert_eq!(
            stack.register("push", Push).unwrap_err(),
            ModelingError::DuplicateCommand("push".to_string())
        );
    }

    #[test]
    fn test_unknown_command() {
        let mut stack = stack();
        let mut target = Items::default();
        assert_eq!(
            stack.execute(&mut target, "nope", ctx("a")).unwrap_err(),
            ModelingError::UnknownCommand("nope".to_string())
        );
        assert!(stack.is_empty());
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut stack = stack();
        let mut target = Items::default();

        stack.execute(&mut target, "push", ctx("a")).unwrap();
        stack.execute(&mut target, "push", ctx("b")).unwrap();
        assert_eq!(target, items(&["a", "b"]));

        assert!(stack.undo(&mut target).unwrap());
        assert_eq!(target, items(&["a"]));
        assert!(stack.can_redo());

        assert!(stack.redo(&mut target).unwrap());
        assert_eq!(target, items(&["a", "b"]));
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_boundaries_are_silent_noops() {
        let bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        bus.subscribe(move |_| *sink.borrow_mut() += 1);

        let mut stack: CommandStack<Items, Ctx> = CommandStack::new(bus);
        stack.register("push", Push).unwrap();
        let mut target = Items::default();

        assert!(!stack.undo(&mut target).unwrap());
        assert!(!stack.redo(&mut target).unwrap());
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_execute_after_undo_discards_redo() {
        let mut stack = stack();
        let mut target = Items::default();

        stack.execute(&mut target, "push", ctx("a")).unwrap();
        stack.execute(&mut target, "push", ctx("b")).unwrap();
        stack.undo(&mut target).unwrap();
        stack.execute(&mut target, "push", ctx("c")).unwrap();

        assert!(!stack.redo(&mut target).unwrap());
        assert_eq!(target, items(&["a", "c"]));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_nested_commands_join_transaction() {
        let mut stack = stack();
        let mut target = Items::default();

        let mut context = ctx("a");
        context.then = vec![
            ("push".to_string(), "b".to_string()),
            ("push".to_string(), "c".to_string()),
        ];
        stack.execute(&mut target, "push", context).unwrap();

        assert_eq!(target, items(&["a", "b", "c"]));
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.transaction_count(), 1);

        stack.undo(&mut target).unwrap();
        assert!(target.0.is_empty());
        assert!(!stack.can_undo());

        stack.redo(&mut target).unwrap();
        assert_eq!(target, items(&["a", "b", "c"]));
    }

    #[test]
    fn test_failed_nested_command_rolls_back() {
        let mut stack = stack();
        let mut target = Items::default();
        stack.execute(&mut target, "push", ctx("x")).unwrap();

        let mut context = ctx("a");
        context.then = vec![
            ("push".to_string(), "b".to_string()),
            ("fail".to_string(), String::new()),
        ];
        let err = stack.execute(&mut target, "push", context).unwrap_err();

        assert_eq!(err, ModelingError::invalid("always fails"));
        assert_eq!(target, items(&["x"]));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.state(), StackState::Idle);

        stack.undo(&mut target).unwrap();
        assert!(target.0.is_empty());
    }

    #[test]
    fn test_history_limit_drops_oldest_transactions() {
        let mut stack = stack().with_max_transactions(Some(2));
        let mut target = Items::default();

        for item in ["a", "b", "c"] {
            stack.execute(&mut target, "push", ctx(item)).unwrap();
        }
        assert_eq!(stack.transaction_count(), 2);

        assert!(stack.undo(&mut target).unwrap());
        assert!(stack.undo(&mut target).unwrap());
        assert!(!stack.undo(&mut target).unwrap());
        assert_eq!(target, items(&["a"]));
    }

    #[test]
    fn test_events_per_entry_and_changed() {
        let bus = EventBus::new();
        let names = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&names);
        bus.subscribe(move |event| sink.borrow_mut().push(event.name()));

        let mut stack: CommandStack<Items, Ctx> = CommandStack::new(bus);
        stack.register("push", Push).unwrap();
        let mut target = Items::default();

        stack.execute(&mut target, "push", ctx("a")).unwrap();
        stack.undo(&mut target).unwrap();

        assert_eq!(
            *names.borrow(),
            vec![
                "commandStack.push.executed",
                "element.changed",
                "commandStack.changed",
                "commandStack.push.reverted",
                "commandStack.changed",
            ]
        );
    }
}
