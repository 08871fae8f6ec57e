//! The diagram tree.
//!
//! [`Canvas`] owns the [`ElementRegistry`] and is the only place where
//! relationships are rewired. Containment (`parent`/`children`) is the single
//! ownership relation. `incoming`, `outgoing` and `label` are non-owning
//! back-references kept in sync with the connection and label that imply them.
//!
//! Every mutating method validates its input completely before touching the
//! graph, so an `Err` return means nothing changed.

use std::collections::HashSet;

use log::{debug, trace};

use crate::{
    element::{Element, ElementData, ElementKind},
    error::CanvasError,
    event::{Event, EventBus},
    geometry::{Bounds, Point},
    identifier::Id,
    registry::ElementRegistry,
};

/// Everything needed to put a removed element back exactly where it was.
///
/// Returned by [`Canvas::remove_element`] and consumed by
/// [`Canvas::restore_element`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedElement {
    element: Element,
    parent: Id,
    index: usize,
    /// Positions in the source's `outgoing` and the target's `incoming`.
    slots: Option<(usize, usize)>,
}

impl RemovedElement {
    /// The element, stripped of relationships.
    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn parent(&self) -> Id {
        self.parent
    }

    /// Position among the parent's children.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Lazy walk from an element's parent up to the root.
#[derive(Debug)]
pub struct Ancestors<'a> {
    registry: &'a ElementRegistry,
    next: Option<Id>,
}

impl Iterator for Ancestors<'_> {
    type Item = Id;

    fn next(&mut self) -> Option<Id> {
        let current = self.next?;
        self.next = self.registry.get(current).and_then(Element::parent);
        Some(current)
    }
}

/// Containment tree and relationship wiring over an [`ElementRegistry`].
#[derive(Debug, Default)]
pub struct Canvas {
    registry: ElementRegistry,
    root: Option<Id>,
    events: EventBus,
}

impl Canvas {
    pub fn new(events: EventBus) -> Self {
        Self {
            registry: ElementRegistry::new(),
            root: None,
            events,
        }
    }

    /// Replaces the bus lifecycle events go to.
    pub fn set_events(&mut self, events: EventBus) {
        self.events = events;
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn root(&self) -> Option<Id> {
        self.root
    }

    pub fn get(&self, id: Id) -> Option<&Element> {
        self.registry.get(id)
    }

    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] if the element is not registered.
    pub fn require(&self, id: Id) -> Result<&Element, CanvasError> {
        self.registry.require(id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.registry.contains(id)
    }

    /// Installs the root element.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidOperation`] if a root is already set or
    /// the element is not a root, and [`CanvasError::DuplicateId`] if its id is
    /// taken.
    pub fn set_root(&mut self, root: Element) -> Result<(), CanvasError> {
        if let Some(existing) = self.root {
            return Err(CanvasError::InvalidOperation(format!(
                "diagram already has root `{existing}`"
            )));
        }
        if root.kind() != ElementKind::Root {
            return Err(CanvasError::InvalidOperation(format!(
                "`{}` is a {}, not a root",
                root.id(),
                root.kind()
            )));
        }
        root.validate()?;

        let id = root.id();
        self.registry.add(root.detached())?;
        self.root = Some(id);
        debug!(root:? = id; "Root installed");
        self.events.emit(&Event::ElementCreated(id));
        Ok(())
    }

    /// Adds a shape under `parent`.
    ///
    /// # Errors
    ///
    /// See [`add_element`](Self::add_element).
    pub fn add_shape(&mut self, shape: Element, parent: Id) -> Result<(), CanvasError> {
        expect_kind(&shape, ElementKind::Shape)?;
        self.add_element(shape, parent, None)
    }

    /// Adds a connection under `parent` and wires it into its endpoints.
    ///
    /// # Errors
    ///
    /// See [`add_element`](Self::add_element).
    pub fn add_connection(&mut self, connection: Element, parent: Id) -> Result<(), CanvasError> {
        expect_kind(&connection, ElementKind::Connection)?;
        self.add_element(connection, parent, None)
    }

    /// Adds a label under `parent` and attaches it to its target.
    ///
    /// # Errors
    ///
    /// See [`add_element`](Self::add_element).
    pub fn add_label(&mut self, label: Element, parent: Id) -> Result<(), CanvasError> {
        expect_kind(&label, ElementKind::Label)?;
        self.add_element(label, parent, None)
    }

    /// Registers a detached element, inserts it among `parent`'s children at
    /// `index` (appending when `None`, clamped otherwise), and wires its
    /// back-references.
    ///
    /// # Errors
    ///
    /// - [`CanvasError::InvalidOperation`] for invalid element data, a root
    ///   element, non-connectable endpoints, a non-labelable target or a target
    ///   that already has a label.
    /// - [`CanvasError::DuplicateId`] if the id is taken.
    /// - [`CanvasError::NotFound`] for a missing parent, endpoint or target.
    /// - [`CanvasError::InvalidParent`] if `parent` cannot hold the element.
    pub fn add_element(
        &mut self,
        element: Element,
        parent: Id,
        index: Option<usize>,
    ) -> Result<(), CanvasError> {
        self.validate_new(&element, parent)?;
        self.insert(element.detached(), parent, index, None)
    }

    fn validate_new(&self, element: &Element, parent: Id) -> Result<(), CanvasError> {
        element.validate()?;
        let id = element.id();
        let kind = element.kind();
        if kind == ElementKind::Root {
            return Err(CanvasError::InvalidOperation(format!(
                "root `{id}` cannot be added as a child"
            )));
        }
        if self.registry.contains(id) {
            return Err(CanvasError::DuplicateId(id));
        }
        self.check_container(id, kind, parent)?;

        match element.data() {
            ElementData::Connection { source, target, .. } => {
                for endpoint in [*source, *target] {
                    let endpoint_element = self.registry.require(endpoint)?;
                    if !endpoint_element.is_connectable() {
                        return Err(CanvasError::InvalidOperation(format!(
                            "{} `{endpoint}` cannot be connected",
                            endpoint_element.kind()
                        )));
                    }
                }
                self.check_connection_parent(id, *source, *target, parent)
            }
            ElementData::Label { target, .. } => {
                let target_element = self.registry.require(*target)?;
                if !target_element.is_labelable() {
                    return Err(CanvasError::InvalidOperation(format!(
                        "{} `{target}` cannot carry a label",
                        target_element.kind()
                    )));
                }
                if let Some(existing) = target_element.label_id() {
                    return Err(CanvasError::InvalidOperation(format!(
                        "`{target}` already has label `{existing}`"
                    )));
                }
                Ok(())
            }
            ElementData::Root | ElementData::Shape { .. } => Ok(()),
        }
    }

    fn insert(
        &mut self,
        element: Element,
        parent: Id,
        index: Option<usize>,
        slots: Option<(usize, usize)>,
    ) -> Result<(), CanvasError> {
        let id = element.id();
        let data = element.data().clone();
        self.registry.add(element)?;

        self.attach(id, parent, index)?;
        match data {
            ElementData::Connection { source, target, .. } => {
                let (outgoing_slot, incoming_slot) = slots.unzip();
                insert_at(
                    self.registry.require_mut(source)?.outgoing_mut(),
                    outgoing_slot,
                    id,
                );
                insert_at(
                    self.registry.require_mut(target)?.incoming_mut(),
                    incoming_slot,
                    id,
                );
            }
            ElementData::Label { target, .. } => {
                self.registry.require_mut(target)?.set_label_id(Some(id));
            }
            ElementData::Root | ElementData::Shape { .. } => {}
        }

        trace!(element:? = id, parent:? = parent; "Element added");
        self.events.emit(&Event::ElementCreated(id));
        Ok(())
    }

    /// Unwires, detaches and unregisters an element.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] if the element is not registered, and
    /// [`CanvasError::InvalidOperation`] for the root or while children,
    /// connections or a label still reference the element.
    pub fn remove_element(&mut self, id: Id) -> Result<RemovedElement, CanvasError> {
        let element = self.registry.require(id)?;
        let blocker = if element.kind() == ElementKind::Root {
            Some("it is the root")
        } else if !element.children().is_empty() {
            Some("it still has children")
        } else if !element.incoming().is_empty() || !element.outgoing().is_empty() {
            Some("connections are still attached")
        } else if element.label_id().is_some() {
            Some("its label is still attached")
        } else {
            None
        };
        if let Some(reason) = blocker {
            return Err(CanvasError::InvalidOperation(format!(
                "cannot remove `{id}`: {reason}"
            )));
        }
        let parent = element.parent().ok_or_else(|| detached_error(id))?;

        let slots = match element.data().clone() {
            ElementData::Connection { source, target, .. } => {
                let outgoing = remove_from(self.registry.require_mut(source)?.outgoing_mut(), id);
                let incoming = remove_from(self.registry.require_mut(target)?.incoming_mut(), id);
                outgoing.zip(incoming)
            }
            ElementData::Label { target, .. } => {
                if let Some(target) = self.registry.get_mut(target) {
                    target.set_label_id(None);
                }
                None
            }
            ElementData::Root | ElementData::Shape { .. } => None,
        };

        let index = self.detach(id)?;
        let element = self.registry.remove(id)?;

        trace!(element:? = id, parent:? = parent; "Element removed");
        self.events.emit(&Event::ElementRemoved(id));
        Ok(RemovedElement {
            element: element.detached(),
            parent,
            index,
            slots,
        })
    }

    /// Puts a removed element back at its old position, including its place
    /// in the endpoints' connection lists.
    ///
    /// # Errors
    ///
    /// Fails like [`add_element`](Self::add_element) if the surroundings
    /// changed so that the element no longer fits.
    pub fn restore_element(&mut self, removed: RemovedElement) -> Result<(), CanvasError> {
        self.validate_new(&removed.element, removed.parent)?;
        self.insert(
            removed.element,
            removed.parent,
            Some(removed.index),
            removed.slots,
        )
    }

    /// Moves an element to `new_parent` at `index` (append when `None`,
    /// clamped otherwise) and returns the previous parent and index.
    ///
    /// # Errors
    ///
    /// - [`CanvasError::NotFound`] if either element is missing.
    /// - [`CanvasError::InvalidParent`] if `new_parent` is not a container,
    ///   the element is the root, or the element is a connection and
    ///   `new_parent` is not an ancestor of both endpoints.
    /// - [`CanvasError::CycleDetected`] if `new_parent` is the element itself
    ///   or one of its descendants.
    pub fn set_parent(
        &mut self,
        id: Id,
        new_parent: Id,
        index: Option<usize>,
    ) -> Result<(Id, usize), CanvasError> {
        let element = self.registry.require(id)?;
        let kind = element.kind();
        self.registry.require(new_parent)?;

        if kind == ElementKind::Root {
            return Err(CanvasError::invalid_parent(
                id,
                kind,
                new_parent,
                "the root is never a child",
            ));
        }
        if new_parent == id || self.is_ancestor(id, new_parent) {
            return Err(CanvasError::CycleDetected {
                element: id,
                parent: new_parent,
            });
        }
        self.check_container(id, kind, new_parent)?;
        if let Some((source, target)) = element.endpoints() {
            self.check_connection_parent(id, source, target, new_parent)?;
        }
        let old_parent = element.parent().ok_or_else(|| detached_error(id))?;

        let old_index = self.detach(id)?;
        self.attach(id, new_parent, index)?;
        trace!(element:? = id, from:? = old_parent, to:? = new_parent; "Element reparented");
        Ok((old_parent, old_index))
    }

    /// Walks from the element's parent up to the root.
    pub fn ancestors(&self, id: Id) -> Ancestors<'_> {
        Ancestors {
            registry: &self.registry,
            next: self.registry.get(id).and_then(Element::parent),
        }
    }

    /// Whether `candidate` is a proper ancestor of `id`.
    pub fn is_ancestor(&self, candidate: Id, id: Id) -> bool {
        self.ancestors(id).any(|ancestor| ancestor == candidate)
    }

    /// Descendants of `id` in depth-first pre-order, excluding `id` itself.
    pub fn descendants(&self, id: Id) -> Vec<Id> {
        let mut result = Vec::new();
        let mut stack: Vec<Id> = self
            .registry
            .get(id)
            .map(|element| element.children().iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            result.push(current);
            if let Some(element) = self.registry.get(current) {
                stack.extend(element.children().iter().rev().copied());
            }
        }
        result
    }

    /// Lowest element that is a proper ancestor of both `a` and `b`.
    pub fn common_ancestor(&self, a: Id, b: Id) -> Option<Id> {
        let of_b: HashSet<Id> = self.ancestors(b).collect();
        self.ancestors(a).find(|ancestor| of_b.contains(ancestor))
    }

    /// Replaces the bounds of a shape or label, returning the old bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] for a missing element and
    /// [`CanvasError::InvalidOperation`] for other kinds or invalid bounds.
    pub fn set_bounds(&mut self, id: Id, bounds: Bounds) -> Result<Bounds, CanvasError> {
        if !bounds.is_valid() {
            return Err(CanvasError::InvalidOperation(format!(
                "invalid bounds {bounds:?} for `{id}`"
            )));
        }
        let element = self.registry.require_mut(id)?;
        let kind = element.kind();
        match element.data_mut() {
            ElementData::Shape { bounds: current } | ElementData::Label { bounds: current, .. } => {
                Ok(std::mem::replace(current, bounds))
            }
            _ => Err(CanvasError::InvalidOperation(format!(
                "{kind} `{id}` has no bounds"
            ))),
        }
    }

    /// Replaces a connection's waypoints wholesale, returning the old ones.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] for a missing element and
    /// [`CanvasError::InvalidOperation`] for other kinds or non-finite points.
    pub fn set_waypoints(
        &mut self,
        id: Id,
        waypoints: Vec<Point>,
    ) -> Result<Vec<Point>, CanvasError> {
        if !waypoints.iter().all(|point| point.is_finite()) {
            return Err(CanvasError::InvalidOperation(format!(
                "non-finite waypoints for `{id}`"
            )));
        }
        let element = self.registry.require_mut(id)?;
        let kind = element.kind();
        match element.data_mut() {
            ElementData::Connection {
                waypoints: current, ..
            } => Ok(std::mem::replace(current, waypoints)),
            _ => Err(CanvasError::InvalidOperation(format!(
                "{kind} `{id}` has no waypoints"
            ))),
        }
    }

    /// Replaces a label's text, returning the old text.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::NotFound`] for a missing element and
    /// [`CanvasError::InvalidOperation`] if it is not a label.
    pub fn set_label_text(&mut self, id: Id, text: String) -> Result<String, CanvasError> {
        let element = self.registry.require_mut(id)?;
        let kind = element.kind();
        match element.data_mut() {
            ElementData::Label { text: current, .. } => Ok(std::mem::replace(current, text)),
            _ => Err(CanvasError::InvalidOperation(format!(
                "{kind} `{id}` has no text"
            ))),
        }
    }

    /// Verifies every structural invariant and reports the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidOperation`] describing the violation.
    pub fn check_integrity(&self) -> Result<(), CanvasError> {
        let violation = |message: String| Err(CanvasError::InvalidOperation(message));

        for element in self.registry.all() {
            let id = element.id();

            if element.kind() == ElementKind::Root {
                if self.root != Some(id) {
                    return violation(format!("stray root `{id}`"));
                }
                if element.parent().is_some() {
                    return violation(format!("root `{id}` has a parent"));
                }
            } else {
                let Some(parent) = element.parent() else {
                    return violation(format!("`{id}` has no parent"));
                };
                let Some(parent_element) = self.registry.get(parent) else {
                    return violation(format!("`{id}` has unregistered parent `{parent}`"));
                };
                let occurrences = parent_element
                    .children()
                    .iter()
                    .filter(|child| **child == id)
                    .count();
                if occurrences != 1 {
                    return violation(format!(
                        "`{parent}` lists child `{id}` {occurrences} times"
                    ));
                }
            }

            for child in element.children() {
                if self.registry.get(*child).and_then(Element::parent) != Some(id) {
                    return violation(format!("child `{child}` of `{id}` points elsewhere"));
                }
            }

            if let Some((source, target)) = element.endpoints() {
                let wired = |end: Id, list: fn(&Element) -> &[Id]| {
                    self.registry
                        .get(end)
                        .is_some_and(|endpoint| list(endpoint).contains(&id))
                };
                if !wired(source, Element::outgoing) {
                    return violation(format!("`{id}` source `{source}` is not wired"));
                }
                if !wired(target, Element::incoming) {
                    return violation(format!("`{id}` target `{target}` is not wired"));
                }
            }
            for connection in element.incoming() {
                let ends = self.registry.get(*connection).and_then(Element::endpoints);
                if ends.map(|(_, target)| target) != Some(id) {
                    return violation(format!("stale incoming `{connection}` on `{id}`"));
                }
            }
            for connection in element.outgoing() {
                let ends = self.registry.get(*connection).and_then(Element::endpoints);
                if ends.map(|(source, _)| source) != Some(id) {
                    return violation(format!("stale outgoing `{connection}` on `{id}`"));
                }
            }

            if let Some(target) = element.label_target() {
                if self.registry.get(target).and_then(Element::label_id) != Some(id) {
                    return violation(format!("label `{id}` target `{target}` is not wired"));
                }
            }
            if let Some(label) = element.label_id() {
                if self.registry.get(label).and_then(Element::label_target) != Some(id) {
                    return violation(format!("stale label `{label}` on `{id}`"));
                }
            }
        }

        if let Some(root) = self.root {
            if !self.registry.contains(root) {
                return violation(format!("root `{root}` is not registered"));
            }
        }
        Ok(())
    }

    /// Drops every element, root included. No events are emitted.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.root = None;
    }

    fn check_container(&self, id: Id, kind: ElementKind, parent: Id) -> Result<(), CanvasError> {
        let parent_kind = self.registry.require(parent)?.kind();
        if parent_kind.can_contain(kind) {
            Ok(())
        } else {
            Err(CanvasError::invalid_parent(
                id,
                kind,
                parent,
                format!("a {parent_kind} is not a container"),
            ))
        }
    }

    fn check_connection_parent(
        &self,
        id: Id,
        source: Id,
        target: Id,
        parent: Id,
    ) -> Result<(), CanvasError> {
        if self.is_ancestor(parent, source) && self.is_ancestor(parent, target) {
            Ok(())
        } else {
            Err(CanvasError::invalid_parent(
                id,
                ElementKind::Connection,
                parent,
                "not a common ancestor of both endpoints",
            ))
        }
    }

    fn attach(&mut self, id: Id, parent: Id, index: Option<usize>) -> Result<(), CanvasError> {
        insert_at(self.registry.require_mut(parent)?.children_mut(), index, id);
        self.registry.require_mut(id)?.set_parent_id(Some(parent));
        Ok(())
    }

    fn detach(&mut self, id: Id) -> Result<usize, CanvasError> {
        let element = self.registry.require_mut(id)?;
        let parent = element.parent().ok_or_else(|| detached_error(id))?;
        element.set_parent_id(None);
        remove_from(self.registry.require_mut(parent)?.children_mut(), id)
            .ok_or_else(|| detached_error(id))
    }
}

fn expect_kind(element: &Element, kind: ElementKind) -> Result<(), CanvasError> {
    if element.kind() == kind {
        Ok(())
    } else {
        Err(CanvasError::InvalidOperation(format!(
            "`{}` is a {}, expected a {kind}",
            element.id(),
            element.kind()
        )))
    }
}

fn detached_error(id: Id) -> CanvasError {
    CanvasError::InvalidOperation(format!("`{id}` is not attached to the tree"))
}

fn insert_at(list: &mut Vec<Id>, index: Option<usize>, id: Id) {
    let index = index.map_or(list.len(), |index| index.min(list.len()));
    list.insert(index, id);
}

fn remove_from(list: &mut Vec<Id>, id: Id) -> Option<usize> {
    let index = list.iter().position(|entry| *entry == id)?;
    list.remove(index);
    Some(index)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn id(name: &str) -> Id {
        Id::new(name)
    }

    fn shape(name: &str, x: f32) -> Element {
        Element::shape(id(name), "bpmn:Task", Bounds::new(x, 0.0, 100.0, 80.0))
    }

    fn flow(name: &str, source: &str, target: &str) -> Element {
        Element::connection(
            id(name),
            "bpmn:SequenceFlow",
            id(source),
            id(target),
            Vec::new(),
        )
    }

    /// Root with shapes `A`, `B` and a container `Sub` holding `C`, plus a
    /// flow `A -> B`.
    fn sample() -> Canvas {
        let mut canvas = Canvas::default();
        canvas.set_root(Element::root(id("Root"), "root")).unwrap();
        canvas.add_shape(shape("A", 0.0), id("Root")).unwrap();
        canvas.add_shape(shape("B", 200.0), id("Root")).unwrap();
        canvas.add_shape(shape("Sub", 400.0), id("Root")).unwrap();
        canvas.add_shape(shape("C", 420.0), id("Sub")).unwrap();
        canvas
            .add_connection(flow("Flow_1", "A", "B"), id("Root"))
            .unwrap();
        canvas
    }

    fn children(canvas: &Canvas, name: &str) -> Vec<Id> {
        canvas.get(id(name)).unwrap().children().to_vec()
    }

    #[test]
    fn test_add_wires_back_references() {
        let canvas = sample();

        assert_eq!(canvas.get(id("A")).unwrap().outgoing(), &[id("Flow_1")]);
        assert_eq!(canvas.get(id("B")).unwrap().incoming(), &[id("Flow_1")]);
        assert_eq!(
            children(&canvas, "Root"),
            vec![id("A"), id("B"), id("Sub"), id("Flow_1")]
        );
        canvas.check_integrity().unwrap();
    }

    #[test]
    fn test_add_label_attaches_to_target() {
        let mut canvas = sample();
        let label = Element::label(id("A_label"), "label", id("A"), Bounds::default(), "Check");
        canvas.add_label(label, id("A")).unwrap();

        assert_eq!(canvas.get(id("A")).unwrap().label_id(), Some(id("A_label")));

        let second = Element::label(id("A_label2"), "label", id("A"), Bounds::default(), "");
        assert!(matches!(
            canvas.add_label(second, id("Root")),
            Err(CanvasError::InvalidOperation(_))
        ));
        canvas.check_integrity().unwrap();
    }

    #[test]
    fn test_add_rejects_label_parent() {
        let mut canvas = sample();
        let label = Element::label(id("A_label"), "label", id("A"), Bounds::default(), "");
        canvas.add_label(label, id("Root")).unwrap();

        let err = canvas.add_shape(shape("D", 0.0), id("A_label")).unwrap_err();
        assert!(matches!(err, CanvasError::InvalidParent { .. }));
        assert!(!canvas.contains(id("D")));
    }

    #[test]
    fn test_add_connection_requires_registered_endpoints() {
        let mut canvas = sample();
        let err = canvas
            .add_connection(flow("Flow_2", "A", "Missing"), id("Root"))
            .unwrap_err();

        assert_eq!(err, CanvasError::NotFound(id("Missing")));
        assert!(canvas.get(id("A")).unwrap().outgoing().len() == 1);
    }

    #[test]
    fn test_connection_on_connection() {
        let mut canvas = sample();
        canvas
            .add_connection(flow("Assoc_1", "C", "Flow_1"), id("Root"))
            .unwrap();

        assert_eq!(
            canvas.get(id("Flow_1")).unwrap().incoming(),
            &[id("Assoc_1")]
        );
        canvas.check_integrity().unwrap();
    }

    #[test]
    fn test_set_parent_connection_under_shape_fails() {
        let mut canvas = sample();
        let before = children(&canvas, "Root");

        let err = canvas.set_parent(id("Flow_1"), id("A"), None).unwrap_err();

        assert!(matches!(
            err,
            CanvasError::InvalidParent {
                kind: ElementKind::Connection,
                ..
            }
        ));
        assert_eq!(children(&canvas, "Root"), before);
        assert_eq!(canvas.get(id("Flow_1")).unwrap().parent(), Some(id("Root")));
        assert!(children(&canvas, "A").is_empty());
    }

    #[test]
    fn test_set_parent_detects_cycles() {
        let mut canvas = sample();

        assert_eq!(
            canvas.set_parent(id("Sub"), id("C"), None).unwrap_err(),
            CanvasError::CycleDetected {
                element: id("Sub"),
                parent: id("C"),
            }
        );
        assert!(matches!(
            canvas.set_parent(id("Sub"), id("Sub"), None),
            Err(CanvasError::CycleDetected { .. })
        ));
        assert!(matches!(
            canvas.set_parent(id("Root"), id("A"), None),
            Err(CanvasError::InvalidParent { .. })
        ));
        canvas.check_integrity().unwrap();
    }

    #[test]
    fn test_set_parent_returns_old_position() {
        let mut canvas = sample();

        let (old_parent, old_index) = canvas.set_parent(id("B"), id("Sub"), Some(0)).unwrap();
        assert_eq!((old_parent, old_index), (id("Root"), 1));
        assert_eq!(children(&canvas, "Sub"), vec![id("B"), id("C")]);

        canvas
            .set_parent(id("B"), old_parent, Some(old_index))
            .unwrap();
        assert_eq!(
            children(&canvas, "Root"),
            vec![id("A"), id("B"), id("Sub"), id("Flow_1")]
        );
        canvas.check_integrity().unwrap();
    }

    #[test]
    fn test_set_parent_clamps_index() {
        let mut canvas = sample();
        canvas.set_parent(id("A"), id("Sub"), Some(99)).unwrap();
        assert_eq!(children(&canvas, "Sub"), vec![id("C"), id("A")]);
    }

    #[test]
    fn test_ancestors_and_common_ancestor() {
        let canvas = sample();

        let ancestors: Vec<Id> = canvas.ancestors(id("C")).collect();
        assert_eq!(ancestors, vec![id("Sub"), id("Root")]);
        assert_eq!(canvas.ancestors(id("Root")).count(), 0);
        assert_eq!(canvas.common_ancestor(id("C"), id("A")), Some(id("Root")));
        assert_eq!(canvas.common_ancestor(id("Sub"), id("C")), Some(id("Root")));
        assert_eq!(canvas.descendants(id("Sub")), vec![id("C")]);
    }

    #[test]
    fn test_remove_refuses_while_referenced() {
        let mut canvas = sample();

        assert!(matches!(
            canvas.remove_element(id("A")),
            Err(CanvasError::InvalidOperation(_))
        ));
        assert!(matches!(
            canvas.remove_element(id("Sub")),
            Err(CanvasError::InvalidOperation(_))
        ));
        assert!(matches!(
            canvas.remove_element(id("Root")),
            Err(CanvasError::InvalidOperation(_))
        ));
        assert!(canvas.contains(id("A")));
    }

    #[test]
    fn test_remove_and_restore_connection() {
        let mut canvas = sample();
        canvas
            .add_connection(flow("Flow_2", "A", "C"), id("Root"))
            .unwrap();
        canvas
            .add_connection(flow("Flow_3", "A", "B"), id("Root"))
            .unwrap();

        let removed = canvas.remove_element(id("Flow_1")).unwrap();
        assert!(!canvas.contains(id("Flow_1")));
        assert_eq!(
            canvas.get(id("A")).unwrap().outgoing(),
            &[id("Flow_2"), id("Flow_3")]
        );
        assert!(canvas.get(id("B")).unwrap().incoming() == [id("Flow_3")]);
        canvas.check_integrity().unwrap();

        canvas.restore_element(removed).unwrap();
        assert_eq!(
            canvas.get(id("A")).unwrap().outgoing(),
            &[id("Flow_1"), id("Flow_2"), id("Flow_3")]
        );
        assert_eq!(
            canvas.get(id("B")).unwrap().incoming(),
            &[id("Flow_1"), id("Flow_3")]
        );
        assert_eq!(children(&canvas, "Root")[3], id("Flow_1"));
        canvas.check_integrity().unwrap();
    }

    #[test]
    fn test_remove_label_clears_target() {
        let mut canvas = sample();
        let label = Element::label(id("B_label"), "label", id("B"), Bounds::default(), "B");
        canvas.add_label(label, id("Root")).unwrap();

        canvas.remove_element(id("B_label")).unwrap();
        assert_eq!(canvas.get(id("B")).unwrap().label_id(), None);
        canvas.check_integrity().unwrap();
    }

    #[test]
    fn test_geometry_mutators_return_previous_values() {
        let mut canvas = sample();

        let old = canvas
            .set_bounds(id("A"), Bounds::new(10.0, 10.0, 100.0, 80.0))
            .unwrap();
        assert_eq!(old, Bounds::new(0.0, 0.0, 100.0, 80.0));

        let points = vec![Point::new(100.0, 40.0), Point::new(200.0, 40.0)];
        assert!(canvas.set_waypoints(id("Flow_1"), points.clone()).unwrap().is_empty());
        assert_eq!(canvas.get(id("Flow_1")).unwrap().waypoints(), Some(&points[..]));

        assert!(matches!(
            canvas.set_waypoints(id("A"), Vec::new()),
            Err(CanvasError::InvalidOperation(_))
        ));
        assert!(matches!(
            canvas.set_bounds(id("A"), Bounds::new(0.0, 0.0, f32::NAN, 1.0)),
            Err(CanvasError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_events_emitted_on_add_and_remove() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let mut canvas = Canvas::new(bus);
        canvas.set_root(Element::root(id("Root"), "root")).unwrap();
        canvas.add_shape(shape("A", 0.0), id("Root")).unwrap();
        canvas.remove_element(id("A")).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                Event::ElementCreated(id("Root")),
                Event::ElementCreated(id("A")),
                Event::ElementRemoved(id("A")),
            ]
        );
    }

    #[test]
    fn test_clear() {
        let mut canvas = sample();
        canvas.clear();

        assert!(canvas.registry().is_empty());
        assert_eq!(canvas.root(), None);
        canvas.set_root(Element::root(id("Root"), "root")).unwrap();
    }
}
