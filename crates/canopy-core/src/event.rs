//! Lifecycle events for renderers and other loosely coupled observers.
//!
//! The [`EventBus`] is the only ambient channel in Canopy. Everything else is
//! wired explicitly at construction time. Cloning a bus yields another handle
//! to the same listener list, so the canvas and the command stack can share one.
//!
//! Listeners run synchronously on the emitting call. A listener must not
//! subscribe or unsubscribe from inside its own callback.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::identifier::Id;

/// A lifecycle notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// An element was registered and attached to the tree.
    ElementCreated(Id),
    /// An element's geometry, text or relationships changed.
    ElementChanged(Id),
    /// An element was detached and unregistered.
    ElementRemoved(Id),
    /// A command entry executed, during `execute` or `redo`.
    CommandExecuted { command: String, elements: Vec<Id> },
    /// A command entry was reverted during `undo` or a failed transaction.
    CommandReverted { command: String, elements: Vec<Id> },
    /// The command history changed (execute, undo, redo or clear).
    StackChanged,
    /// A new diagram replaced the previous one.
    ImportDone { elements: usize },
}

impl Event {
    /// The dotted event name observers filter on, e.g.
    /// `commandStack.shape.create.executed`.
    pub fn name(&self) -> String {
        match self {
            Self::ElementCreated(_) => "element.created".to_string(),
            Self::ElementChanged(_) => "element.changed".to_string(),
            Self::ElementRemoved(_) => "element.removed".to_string(),
            Self::CommandExecuted { command, .. } => format!("commandStack.{command}.executed"),
            Self::CommandReverted { command, .. } => format!("commandStack.{command}.reverted"),
            Self::StackChanged => "commandStack.changed".to_string(),
            Self::ImportDone { .. } => "import.done".to_string(),
        }
    }

    /// The elements this event is about.
    pub fn elements(&self) -> Vec<Id> {
        match self {
            Self::ElementCreated(id) | Self::ElementChanged(id) | Self::ElementRemoved(id) => {
                vec![*id]
            }
            Self::CommandExecuted { elements, .. } | Self::CommandReverted { elements, .. } => {
                elements.clone()
            }
            Self::StackChanged | Self::ImportDone { .. } => Vec::new(),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

type Listener = Box<dyn FnMut(&Event)>;

#[derive(Default)]
struct Listeners {
    next_id: usize,
    entries: Vec<(SubscriptionId, Listener)>,
}

/// Shared publish/subscribe channel for [`Event`]s.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Rc<RefCell<Listeners>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener that receives every subsequent event.
    pub fn subscribe(&self, listener: impl FnMut(&Event) + 'static) -> SubscriptionId {
        let mut listeners = self.listeners.borrow_mut();
        let id = SubscriptionId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry_id, _)| *entry_id != id);
        listeners.entries.len() != before
    }

    /// Delivers `event` to every listener in subscription order.
    pub fn emit(&self, event: &Event) {
        let mut listeners = self.listeners.borrow_mut();
        for (_, listener) in listeners.entries.iter_mut() {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
