//! Shape commands.

use std::rc::Rc;

use log::debug;

use canopy_core::{
    canvas::RemovedElement,
    element::{Element, ElementKind},
    geometry::{Bounds, Point},
    identifier::Id,
    semantic::SemanticNode,
    CanvasError,
};

use super::{
    check_business_object, create_business_object, detach_business_object,
    reattach_business_object, remove_business_object, run,
    connection::{ConnectionCreate, ConnectionDelete, LayoutConnection},
    label::LabelDelete,
    DetachedBusinessObject, ModelingScope, TypedHandler,
};
use crate::{
    diagram::Diagram,
    error::{ModelingError, Result},
    rules::Rules,
};

/// Deletes whatever depends on `element`: attached connections, its label
/// and its children. Each goes through its own delete command.
pub(crate) fn delete_dependents(scope: &mut ModelingScope<'_>, element: Id) -> Result<()> {
    let Some(current) = scope.target().element(element) else {
        return Ok(());
    };
    let connections: Vec<Id> = current
        .incoming()
        .iter()
        .chain(current.outgoing())
        .copied()
        .collect();
    let label = current.label_id();
    let children: Vec<Id> = current.children().to_vec();

    for connection in connections {
        if scope.target().canvas().contains(connection) {
            run(scope, ConnectionDelete::new(connection))?;
        }
    }
    if let Some(label) = label {
        if scope.target().canvas().contains(label) {
            run(scope, LabelDelete::new(label))?;
        }
    }
    for child in children {
        delete_element(scope, child)?;
    }
    Ok(())
}

/// Deletes one element with the command matching its kind. Missing elements
/// are skipped: an earlier delete in the same transaction may have taken them.
pub(crate) fn delete_element(scope: &mut ModelingScope<'_>, id: Id) -> Result<()> {
    let Some(kind) = scope.target().element(id).map(Element::kind) else {
        return Ok(());
    };
    match kind {
        ElementKind::Shape => run(scope, ShapeDelete::new(id)).map(drop),
        ElementKind::Connection => run(scope, ConnectionDelete::new(id)).map(drop),
        ElementKind::Label => run(scope, LabelDelete::new(id)).map(drop),
        ElementKind::Root => Err(ModelingError::invalid("the root cannot be deleted")),
    }
}

/// Re-lays out every connection attached to `element`.
pub(crate) fn layout_attached(scope: &mut ModelingScope<'_>, element: Id) -> Result<()> {
    let connections: Vec<Id> = scope
        .target()
        .element(element)
        .map(|e| e.incoming().iter().chain(e.outgoing()).copied().collect())
        .unwrap_or_default();
    for connection in connections {
        run(scope, LayoutConnection::new(connection))?;
    }
    Ok(())
}

/// Context of `shape.create`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeCreate {
    pub shape: Id,
    pub element_type: String,
    pub bounds: Bounds,
    pub parent: Id,
    /// Position among the parent's children. Appends when `None`.
    pub index: Option<usize>,
    /// Parent of the new business object. Defaults to the visual parent's
    /// business object.
    pub semantic_parent: Option<Id>,
}

impl ShapeCreate {
    pub fn new(shape: Id, element_type: impl Into<String>, bounds: Bounds, parent: Id) -> Self {
        Self {
            shape,
            element_type: element_type.into(),
            bounds,
            parent,
            index: None,
            semantic_parent: None,
        }
    }
}

pub(crate) struct CreateShapeHandler;

impl TypedHandler for CreateShapeHandler {
    type Ctx = ShapeCreate;

    fn execute(&self, context: &mut ShapeCreate, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let semantic_parent = context.semantic_parent.or_else(|| {
            diagram
                .element(context.parent)
                .and_then(Element::business_object)
        });
        check_business_object(diagram, context.shape, semantic_parent)?;

        let shape = Element::shape(context.shape, context.element_type.as_str(), context.bounds)
            .with_business_object(Some(context.shape));
        diagram
            .canvas_mut()
            .add_element(shape, context.parent, context.index)?;
        create_business_object(
            diagram,
            SemanticNode::new(context.shape, context.element_type.as_str(), semantic_parent),
        )?;

        context.semantic_parent = semantic_parent;
        Ok(vec![context.shape, context.parent])
    }

    fn revert(&self, context: &ShapeCreate, diagram: &mut Diagram) -> Result<Vec<Id>> {
        diagram.canvas_mut().remove_element(context.shape)?;
        remove_business_object(diagram, context.shape)?;
        Ok(vec![context.shape, context.parent])
    }
}

/// Context of `shape.delete`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDelete {
    pub shape: Id,
    removed: Option<RemovedElement>,
    business_object: Option<DetachedBusinessObject>,
}

impl ShapeDelete {
    pub fn new(shape: Id) -> Self {
        Self {
            shape,
            removed: None,
            business_object: None,
        }
    }
}

pub(crate) struct DeleteShapeHandler;

impl TypedHandler for DeleteShapeHandler {
    type Ctx = ShapeDelete;

    fn pre_execute(&self, context: &mut ShapeDelete, scope: &mut ModelingScope<'_>) -> Result<()> {
        let element = scope.target().canvas().require(context.shape)?;
        if element.kind() != ElementKind::Shape {
            return Err(ModelingError::invalid(format!(
                "`{}` is a {}, not a shape",
                context.shape,
                element.kind()
            )));
        }
        delete_dependents(scope, context.shape)
    }

    fn execute(&self, context: &mut ShapeDelete, diagram: &mut Diagram) -> Result<Vec<Id>> {
        diagram.canvas().require(context.shape)?;
        let business_object = detach_business_object(diagram, context.shape)?;
        let removed = match diagram.canvas_mut().remove_element(context.shape) {
            Ok(removed) => removed,
            Err(err) => {
                if let Some(detached) = &business_object {
                    reattach_business_object(diagram, context.shape, detached)?;
                }
                return Err(err.into());
            }
        };
        let parent = removed.parent();
        context.removed = Some(removed);
        context.business_object = business_object;
        Ok(vec![context.shape, parent])
    }

    fn revert(&self, context: &ShapeDelete, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let removed = context
            .removed
            .clone()
            .ok_or_else(|| ModelingError::invalid("shape.delete reverted before execution"))?;
        let parent = removed.parent();
        diagram.canvas_mut().restore_element(removed)?;
        if let Some(detached) = &context.business_object {
            reattach_business_object(diagram, context.shape, detached)?;
        }
        Ok(vec![context.shape, parent])
    }
}

/// Context of `shape.move`: translates a shape or label and optionally
/// re-parents it.
///
/// This is the primitive. It neither moves labels along nor touches
/// connections; `elements.move` composes those.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMove {
    pub shape: Id,
    pub delta: Point,
    pub new_parent: Option<Id>,
    pub index: Option<usize>,
    old_bounds: Option<Bounds>,
    old_parent: Option<(Id, usize)>,
    /// Previous semantic parent, when the business object was re-parented.
    old_semantic_parent: Option<Option<Id>>,
}

impl ShapeMove {
    pub fn new(shape: Id, delta: Point) -> Self {
        Self {
            shape,
            delta,
            new_parent: None,
            index: None,
            old_bounds: None,
            old_parent: None,
            old_semantic_parent: None,
        }
    }

    /// Also moves the element under `parent`.
    pub fn with_parent(mut self, parent: Option<Id>) -> Self {
        self.new_parent = parent;
        self
    }
}

pub(crate) struct MoveShapeHandler;

impl TypedHandler for MoveShapeHandler {
    type Ctx = ShapeMove;

    fn execute(&self, context: &mut ShapeMove, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let element = diagram.canvas().require(context.shape)?;
        let bounds = element.bounds().ok_or_else(|| {
            ModelingError::invalid(format!("{} `{}` cannot be moved", element.kind(), context.shape))
        })?;
        let moved = bounds.translate(context.delta);
        if !context.delta.is_finite() || !moved.is_valid() {
            return Err(ModelingError::invalid(format!(
                "invalid move of `{}` by {:?}",
                context.shape, context.delta
            )));
        }
        let reparent = context
            .new_parent
            .filter(|new_parent| element.parent() != Some(*new_parent));

        // Decide the semantic re-parent up front; the canvas re-parent below is
        // the first mutation and everything after it cannot fail.
        let semantic_move = reparent.and_then(|new_parent| {
            let node = element.business_object()?;
            let semantic_parent = diagram
                .element(new_parent)
                .and_then(Element::business_object)?;
            let semantics = diagram.semantics();
            let current = semantics.node(node)?.parent();
            (semantics.contains(semantic_parent) && current != Some(semantic_parent))
                .then_some((node, semantic_parent))
        });

        let mut touched = vec![context.shape];
        context.old_parent = None;
        context.old_semantic_parent = None;
        if let Some(new_parent) = reparent {
            let old = diagram
                .canvas_mut()
                .set_parent(context.shape, new_parent, context.index)?;
            touched.extend([old.0, new_parent]);
            context.old_parent = Some(old);
        }
        if let Some((node, semantic_parent)) = semantic_move {
            let previous = diagram
                .semantics_mut()
                .set_parent(node, Some(semantic_parent))?;
            context.old_semantic_parent = Some(previous);
        }

        context.old_bounds = Some(diagram.canvas_mut().set_bounds(context.shape, moved)?);
        Ok(touched)
    }

    fn revert(&self, context: &ShapeMove, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let mut touched = vec![context.shape];
        if let Some(bounds) = context.old_bounds {
            diagram.canvas_mut().set_bounds(context.shape, bounds)?;
        }
        if let Some((parent, index)) = context.old_parent {
            let (current, _) = diagram
                .canvas_mut()
                .set_parent(context.shape, parent, Some(index))?;
            touched.extend([current, parent]);
        }
        if let Some(previous) = context.old_semantic_parent {
            let node = diagram
                .element(context.shape)
                .and_then(Element::business_object);
            if let Some(node) = node {
                diagram.semantics_mut().set_parent(node, previous)?;
            }
        }
        Ok(touched)
    }
}

/// Context of `shape.resize`. Attached connections are laid out again.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeResize {
    pub shape: Id,
    pub bounds: Bounds,
    old_bounds: Option<Bounds>,
}

impl ShapeResize {
    pub fn new(shape: Id, bounds: Bounds) -> Self {
        Self {
            shape,
            bounds,
            old_bounds: None,
        }
    }
}

pub(crate) struct ResizeShapeHandler;

impl TypedHandler for ResizeShapeHandler {
    type Ctx = ShapeResize;

    fn execute(&self, context: &mut ShapeResize, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let kind = diagram.canvas().require(context.shape)?.kind();
        if kind != ElementKind::Shape {
            return Err(ModelingError::invalid(format!(
                "{kind} `{}` cannot be resized",
                context.shape
            )));
        }
        context.old_bounds = Some(
            diagram
                .canvas_mut()
                .set_bounds(context.shape, context.bounds)?,
        );
        Ok(vec![context.shape])
    }

    fn revert(&self, context: &ShapeResize, diagram: &mut Diagram) -> Result<Vec<Id>> {
        if let Some(bounds) = context.old_bounds {
            diagram.canvas_mut().set_bounds(context.shape, bounds)?;
        }
        Ok(vec![context.shape])
    }

    fn post_execute(&self, context: &mut ShapeResize, scope: &mut ModelingScope<'_>) -> Result<()> {
        layout_attached(scope, context.shape)
    }
}

/// Context of `shape.append`: creates a shape next to `source` and connects
/// the two.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeAppend {
    pub source: Id,
    pub shape: Id,
    pub element_type: String,
    pub bounds: Bounds,
    pub connection: Id,
    pub connection_type: String,
    /// Parent of the new business object, see [`ShapeCreate::semantic_parent`].
    pub semantic_parent: Option<Id>,
}

pub(crate) struct AppendShapeHandler {
    rules: Rc<dyn Rules>,
}

impl AppendShapeHandler {
    pub(crate) fn new(rules: Rc<dyn Rules>) -> Self {
        Self { rules }
    }
}

impl TypedHandler for AppendShapeHandler {
    type Ctx = ShapeAppend;

    fn pre_execute(&self, context: &mut ShapeAppend, scope: &mut ModelingScope<'_>) -> Result<()> {
        let source = scope.target().canvas().require(context.source)?;
        if !source.is_connectable() {
            return Err(ModelingError::invalid(format!(
                "{} `{}` cannot be connected",
                source.kind(),
                context.source
            )));
        }
        if !self.rules.can_connect(source, &context.element_type) {
            return Err(ModelingError::invalid(format!(
                "cannot append {} to `{}`",
                context.element_type, context.source
            )));
        }
        let parent = source
            .parent()
            .ok_or(CanvasError::NotFound(context.source))?;

        debug!(source:? = context.source, shape:? = context.shape; "Appending shape");
        let mut create = ShapeCreate::new(
            context.shape,
            context.element_type.as_str(),
            context.bounds,
            parent,
        );
        create.semantic_parent = context.semantic_parent;
        let created = run(scope, create)?;
        context.semantic_parent = created.semantic_parent;
        Ok(())
    }

    fn execute(&self, context: &mut ShapeAppend, _diagram: &mut Diagram) -> Result<Vec<Id>> {
        Ok(vec![context.source, context.shape])
    }

    fn revert(&self, context: &ShapeAppend, _diagram: &mut Diagram) -> Result<Vec<Id>> {
        Ok(vec![context.source, context.shape])
    }

    fn post_execute(&self, context: &mut ShapeAppend, scope: &mut ModelingScope<'_>) -> Result<()> {
        let connect = ConnectionCreate::new(
            context.connection,
            context.connection_type.as_str(),
            context.source,
            context.shape,
        );
        run(scope, connect)?;
        Ok(())
    }
}
