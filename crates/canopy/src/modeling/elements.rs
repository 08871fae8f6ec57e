//! Multi-element commands.
//!
//! Both commands do their work through nested primitive commands and record
//! a no-op entry of their own, so observers still see one
//! `commandStack.elements.*.executed` event per user action.

use indexmap::IndexSet;
use log::debug;

use canopy_core::{
    canvas::Canvas,
    element::{Element, ElementKind},
    geometry::Point,
    identifier::Id,
    CanvasError,
};

use super::{
    connection::{ConnectionMove, LayoutConnection},
    run,
    shape::{delete_element, ShapeMove},
    ModelingScope, TypedHandler,
};
use crate::{
    diagram::Diagram,
    error::{ModelingError, Result},
};

fn require_movable(canvas: &Canvas, id: Id) -> Result<&Element> {
    let element = canvas.require(id)?;
    if element.kind() == ElementKind::Root {
        return Err(ModelingError::invalid("the root cannot be moved or deleted"));
    }
    Ok(element)
}

/// What a move touches, computed once before anything changes.
#[derive(Debug, Clone, Default, PartialEq)]
struct MovePlan {
    /// Shapes and labels translated by the delta, with their new parent.
    moved: Vec<(Id, Option<Id>)>,
    /// Connections whose waypoints are translated.
    translated: Vec<Id>,
    /// Connections with one end outside the moved set.
    relayout: Vec<Id>,
    /// Connections parked under the root while their endpoints move.
    lifted: Vec<Id>,
}

/// Context of `elements.move`.
///
/// Moves `elements` together with their descendants and labels by `delta`.
/// Top-level elements, and labels sitting next to them, go to `new_parent`
/// when one is given. Connections with both ends moved are translated, the
/// others are laid out again, and connection parents are repaired to the
/// lowest common ancestor of their endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementsMove {
    pub elements: Vec<Id>,
    pub delta: Point,
    pub new_parent: Option<Id>,
    plan: Option<MovePlan>,
}

impl ElementsMove {
    pub fn new(elements: Vec<Id>, delta: Point) -> Self {
        Self {
            elements,
            delta,
            new_parent: None,
            plan: None,
        }
    }

    pub fn with_parent(mut self, parent: Option<Id>) -> Self {
        self.new_parent = parent;
        self
    }
}

fn plan_move(canvas: &Canvas, context: &ElementsMove) -> Result<MovePlan> {
    if !context.delta.is_finite() {
        return Err(ModelingError::invalid(format!(
            "invalid move delta {:?}",
            context.delta
        )));
    }

    // Closure: shapes and labels that move, connections travelling inside them.
    let mut moved: IndexSet<Id> = IndexSet::new();
    let mut translated: IndexSet<Id> = IndexSet::new();
    for id in &context.elements {
        let element = require_movable(canvas, *id)?;
        if element.kind() == ElementKind::Connection {
            translated.insert(*id);
            continue;
        }
        moved.insert(*id);
        for descendant in canvas.descendants(*id) {
            match canvas.get(descendant).map(Element::kind) {
                Some(ElementKind::Connection) => {
                    translated.insert(descendant);
                }
                Some(_) => {
                    moved.insert(descendant);
                }
                None => {}
            }
        }
    }

    if let Some(new_parent) = context.new_parent {
        canvas.require(new_parent)?;
        if let Some(element) = moved.iter().find(|id| **id == new_parent) {
            return Err(CanvasError::CycleDetected {
                element: *element,
                parent: new_parent,
            }
            .into());
        }
    }

    // Connections attached to anything that moves.
    let mut attached: IndexSet<Id> = IndexSet::new();
    for id in moved.iter().chain(translated.iter()) {
        if let Some(element) = canvas.get(*id) {
            for connection in element.incoming().iter().chain(element.outgoing()) {
                if !translated.contains(connection) {
                    attached.insert(*connection);
                }
            }
        }
    }
    let inside = |id: Id, moved: &IndexSet<Id>, translated: &IndexSet<Id>| {
        moved.contains(&id) || translated.contains(&id)
    };
    let mut relayout = Vec::new();
    for connection in attached {
        let Some((source, target)) = canvas.get(connection).and_then(Element::endpoints) else {
            continue;
        };
        if inside(source, &moved, &translated) && inside(target, &moved, &translated) {
            translated.insert(connection);
        } else {
            relayout.push(connection);
        }
    }

    // Labels travel with their moved or translated targets.
    let labels: Vec<Id> = moved
        .iter()
        .chain(translated.iter())
        .filter_map(|id| canvas.get(*id).and_then(Element::label_id))
        .collect();
    moved.extend(labels);

    // Connections whose parent may stop being a common ancestor.
    let root = canvas.root();
    let mut lifted = Vec::new();
    if context.new_parent.is_some() {
        for connection in translated.iter().chain(relayout.iter()) {
            let parent = canvas.get(*connection).and_then(Element::parent);
            if let Some(parent) = parent {
                if Some(parent) != root && !moved.contains(&parent) {
                    lifted.push(*connection);
                }
            }
        }
    }

    // Top-level moved elements, plus labels next to a top-level target.
    let top_level: IndexSet<Id> = moved
        .iter()
        .copied()
        .filter(|id| !canvas.ancestors(*id).any(|ancestor| moved.contains(&ancestor)))
        .collect();
    let moved = moved
        .iter()
        .map(|id| {
            let new_parent = context.new_parent.filter(|_| {
                let element = canvas.get(*id);
                let sibling_label = element
                    .and_then(Element::label_target)
                    .and_then(|target| canvas.get(target))
                    .is_some_and(|target| {
                        top_level.contains(&target.id())
                            && target.parent() == element.and_then(Element::parent)
                    });
                top_level.contains(id) || sibling_label
            });
            (*id, new_parent)
        })
        .collect();

    Ok(MovePlan {
        moved,
        translated: translated.into_iter().collect(),
        relayout,
        lifted,
    })
}

pub(crate) struct MoveElementsHandler;

impl TypedHandler for MoveElementsHandler {
    type Ctx = ElementsMove;

    fn pre_execute(&self, context: &mut ElementsMove, scope: &mut ModelingScope<'_>) -> Result<()> {
        let plan = plan_move(scope.target().canvas(), context)?;
        debug!(
            moved = plan.moved.len(),
            translated = plan.translated.len(),
            relayout = plan.relayout.len();
            "Moving elements"
        );

        if let Some(root) = scope.target().canvas().root() {
            for connection in &plan.lifted {
                let park = ConnectionMove::new(*connection, Point::default()).with_parent(Some(root));
                run(scope, park)?;
            }
        }
        for (id, new_parent) in &plan.moved {
            run(scope, ShapeMove::new(*id, context.delta).with_parent(*new_parent))?;
        }

        context.plan = Some(plan);
        Ok(())
    }

    fn execute(&self, context: &mut ElementsMove, _diagram: &mut Diagram) -> Result<Vec<Id>> {
        Ok(context.elements.clone())
    }

    fn revert(&self, context: &ElementsMove, _diagram: &mut Diagram) -> Result<Vec<Id>> {
        Ok(context.elements.clone())
    }

    fn post_execute(&self, context: &mut ElementsMove, scope: &mut ModelingScope<'_>) -> Result<()> {
        let Some(plan) = context.plan.clone() else {
            return Ok(());
        };

        for connection in &plan.translated {
            let parent = repaired_parent(scope, &plan, *connection);
            run(
                scope,
                ConnectionMove::new(*connection, context.delta).with_parent(parent),
            )?;
        }
        for connection in &plan.relayout {
            let parent = repaired_parent(scope, &plan, *connection);
            if parent.is_some() {
                run(
                    scope,
                    ConnectionMove::new(*connection, Point::default()).with_parent(parent),
                )?;
            }
            run(scope, LayoutConnection::new(*connection))?;
        }
        Ok(())
    }
}

/// Final parent of a lifted connection: the lowest common ancestor of its
/// endpoints after the move.
fn repaired_parent(scope: &ModelingScope<'_>, plan: &MovePlan, connection: Id) -> Option<Id> {
    if !plan.lifted.contains(&connection) {
        return None;
    }
    let canvas = scope.target().canvas();
    let (source, target) = canvas.get(connection).and_then(Element::endpoints)?;
    canvas.common_ancestor(source, target)
}

/// Context of `elements.delete`.
///
/// Deletes `elements` with everything that depends on them: descendants,
/// labels and attached connections, transitively. Connections go first
/// (those attached to other connections before the ones they attach to),
/// then labels, then shapes with children before parents.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementsDelete {
    pub elements: Vec<Id>,
}

impl ElementsDelete {
    pub fn new(elements: Vec<Id>) -> Self {
        Self { elements }
    }
}

/// Every element that has to go when `elements` are deleted, in removal
/// order.
pub(crate) fn deletion_order(canvas: &Canvas, elements: &[Id]) -> Result<Vec<Id>> {
    let mut closure: IndexSet<Id> = IndexSet::new();
    let mut queue: Vec<Id> = Vec::new();
    for id in elements {
        require_movable(canvas, *id)?;
        queue.push(*id);
    }
    while let Some(id) = queue.pop() {
        if !closure.insert(id) {
            continue;
        }
        let Some(element) = canvas.get(id) else {
            continue;
        };
        queue.extend(element.children());
        queue.extend(element.incoming());
        queue.extend(element.outgoing());
        queue.extend(element.label_id());
    }

    let of_kind = |kind: ElementKind| -> Vec<Id> {
        closure
            .iter()
            .copied()
            .filter(|id| canvas.get(*id).map(Element::kind) == Some(kind))
            .collect()
    };

    let mut connections = Vec::new();
    let mut pending = of_kind(ElementKind::Connection);
    while !pending.is_empty() {
        let (ready, blocked): (Vec<Id>, Vec<Id>) = pending.iter().partition(|id| {
            canvas.get(**id).is_some_and(|connection| {
                connection
                    .incoming()
                    .iter()
                    .chain(connection.outgoing())
                    .all(|other| !pending.contains(other))
            })
        });
        if ready.is_empty() {
            connections.extend(blocked);
            break;
        }
        connections.extend(ready);
        pending = blocked;
    }

    let labels = of_kind(ElementKind::Label);

    let mut shapes = of_kind(ElementKind::Shape);
    shapes.sort_by_key(|id| std::cmp::Reverse(canvas.ancestors(*id).count()));

    Ok(connections.into_iter().chain(labels).chain(shapes).collect())
}

pub(crate) struct DeleteElementsHandler;

impl TypedHandler for DeleteElementsHandler {
    type Ctx = ElementsDelete;

    fn pre_execute(&self, context: &mut ElementsDelete, scope: &mut ModelingScope<'_>) -> Result<()> {
        let order = deletion_order(scope.target().canvas(), &context.elements)?;
        debug!(elements = order.len(); "Deleting elements");
        for id in order {
            delete_element(scope, id)?;
        }
        Ok(())
    }

    fn execute(&self, context: &mut ElementsDelete, _diagram: &mut Diagram) -> Result<Vec<Id>> {
        Ok(context.elements.clone())
    }

    fn revert(&self, context: &ElementsDelete, _diagram: &mut Diagram) -> Result<Vec<Id>> {
        Ok(context.elements.clone())
    }
}
