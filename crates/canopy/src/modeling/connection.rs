//! Connection commands.

use std::rc::Rc;

use canopy_core::{
    canvas::RemovedElement,
    element::Element,
    geometry::Point,
    identifier::Id,
    semantic::SemanticNode,
};

use super::{
    check_business_object, create_business_object, detach_business_object,
    reattach_business_object, remove_business_object, shape::delete_dependents,
    DetachedBusinessObject, ModelingScope, TypedHandler,
};
use crate::{
    diagram::Diagram,
    error::{ModelingError, Result},
    layout,
    rules::Rules,
};

/// Context of `connection.create`.
///
/// Unset fields are resolved on first execution and stored, so a redo
/// recreates the exact same connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionCreate {
    pub connection: Id,
    pub element_type: String,
    pub source: Id,
    pub target: Id,
    /// Defaults to the lowest common ancestor of both endpoints.
    pub parent: Option<Id>,
    /// Defaults to a straight route between the endpoints.
    pub waypoints: Option<Vec<Point>>,
    /// Defaults to the parent of the source's business object.
    pub semantic_parent: Option<Id>,
}

impl ConnectionCreate {
    pub fn new(connection: Id, element_type: impl Into<String>, source: Id, target: Id) -> Self {
        Self {
            connection,
            element_type: element_type.into(),
            source,
            target,
            parent: None,
            waypoints: None,
            semantic_parent: None,
        }
    }
}

pub(crate) struct CreateConnectionHandler {
    rules: Rc<dyn Rules>,
}

impl CreateConnectionHandler {
    pub(crate) fn new(rules: Rc<dyn Rules>) -> Self {
        Self { rules }
    }
}

impl TypedHandler for CreateConnectionHandler {
    type Ctx = ConnectionCreate;

    fn execute(&self, context: &mut ConnectionCreate, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let canvas = diagram.canvas();
        let source = canvas.require(context.source)?;
        let target = canvas.require(context.target)?;
        if !self.rules.can_connect(source, target.element_type()) {
            return Err(ModelingError::invalid(format!(
                "cannot connect `{}` to `{}`",
                context.source, context.target
            )));
        }

        let parent = context
            .parent
            .or_else(|| canvas.common_ancestor(context.source, context.target))
            .ok_or_else(|| {
                ModelingError::invalid(format!(
                    "`{}` and `{}` share no container",
                    context.source, context.target
                ))
            })?;
        let waypoints = match &context.waypoints {
            Some(waypoints) => waypoints.clone(),
            None => layout::route(canvas, context.source, context.target)?,
        };
        let source_object = source.business_object();
        let target_object = target.business_object();
        let semantic_parent = context
            .semantic_parent
            .or_else(|| {
                source_object
                    .and_then(|node| diagram.semantics().node(node))
                    .and_then(SemanticNode::parent)
            })
            .or_else(|| diagram.element(parent).and_then(Element::business_object));
        check_business_object(diagram, context.connection, semantic_parent)?;

        let element = Element::connection(
            context.connection,
            context.element_type.as_str(),
            context.source,
            context.target,
            waypoints.clone(),
        )
        .with_business_object(Some(context.connection));
        diagram.canvas_mut().add_element(element, parent, None)?;

        let mut node =
            SemanticNode::new(context.connection, context.element_type.as_str(), semantic_parent);
        if let Some(source_object) = source_object {
            node = node.with_attribute("sourceRef", source_object.to_string());
        }
        if let Some(target_object) = target_object {
            node = node.with_attribute("targetRef", target_object.to_string());
        }
        create_business_object(diagram, node)?;

        context.parent = Some(parent);
        context.waypoints = Some(waypoints);
        context.semantic_parent = semantic_parent;
        Ok(vec![context.connection, context.source, context.target])
    }

    fn revert(&self, context: &ConnectionCreate, diagram: &mut Diagram) -> Result<Vec<Id>> {
        diagram.canvas_mut().remove_element(context.connection)?;
        remove_business_object(diagram, context.connection)?;
        Ok(vec![context.connection, context.source, context.target])
    }
}

/// Context of `connection.delete`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionDelete {
    pub connection: Id,
    removed: Option<RemovedElement>,
    business_object: Option<DetachedBusinessObject>,
}

impl ConnectionDelete {
    pub fn new(connection: Id) -> Self {
        Self {
            connection,
            removed: None,
            business_object: None,
        }
    }
}

pub(crate) struct DeleteConnectionHandler;

impl TypedHandler for DeleteConnectionHandler {
    type Ctx = ConnectionDelete;

    fn pre_execute(
        &self,
        context: &mut ConnectionDelete,
        scope: &mut ModelingScope<'_>,
    ) -> Result<()> {
        require_connection(scope.target(), context.connection)?;
        delete_dependents(scope, context.connection)
    }

    fn execute(&self, context: &mut ConnectionDelete, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let (source, target) = require_connection(diagram, context.connection)?;
        let business_object = detach_business_object(diagram, context.connection)?;
        let removed = match diagram.canvas_mut().remove_element(context.connection) {
            Ok(removed) => removed,
            Err(err) => {
                if let Some(detached) = &business_object {
                    reattach_business_object(diagram, context.connection, detached)?;
                }
                return Err(err.into());
            }
        };
        context.removed = Some(removed);
        context.business_object = business_object;
        Ok(vec![context.connection, source, target])
    }

    fn revert(&self, context: &ConnectionDelete, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let removed = context.removed.clone().ok_or_else(|| {
            ModelingError::invalid("connection.delete reverted before execution")
        })?;
        diagram.canvas_mut().restore_element(removed)?;
        if let Some(detached) = &context.business_object {
            reattach_business_object(diagram, context.connection, detached)?;
        }
        let (source, target) = require_connection(diagram, context.connection)?;
        Ok(vec![context.connection, source, target])
    }
}

fn require_connection(diagram: &Diagram, id: Id) -> Result<(Id, Id)> {
    let element = diagram.canvas().require(id)?;
    element.endpoints().ok_or_else(|| {
        ModelingError::invalid(format!("`{id}` is a {}, not a connection", element.kind()))
    })
}

/// Context of `connection.move`: translates the waypoints and optionally
/// re-parents the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionMove {
    pub connection: Id,
    pub delta: Point,
    pub new_parent: Option<Id>,
    old_waypoints: Option<Vec<Point>>,
    old_parent: Option<(Id, usize)>,
}

impl ConnectionMove {
    pub fn new(connection: Id, delta: Point) -> Self {
        Self {
            connection,
            delta,
            new_parent: None,
            old_waypoints: None,
            old_parent: None,
        }
    }

    pub fn with_parent(mut self, parent: Option<Id>) -> Self {
        self.new_parent = parent;
        self
    }
}

pub(crate) struct MoveConnectionHandler;

impl TypedHandler for MoveConnectionHandler {
    type Ctx = ConnectionMove;

    fn execute(&self, context: &mut ConnectionMove, diagram: &mut Diagram) -> Result<Vec<Id>> {
        require_connection(diagram, context.connection)?;
        if !context.delta.is_finite() {
            return Err(ModelingError::invalid(format!(
                "invalid move of `{}` by {:?}",
                context.connection, context.delta
            )));
        }
        let element = diagram.canvas().require(context.connection)?;
        let current_parent = element.parent();
        let moved: Vec<Point> = element
            .waypoints()
            .unwrap_or_default()
            .iter()
            .map(|point| point.add_point(context.delta))
            .collect();
        if !moved.iter().all(|point| point.is_finite()) {
            return Err(ModelingError::invalid(format!(
                "moving `{}` by {:?} leaves non-finite waypoints",
                context.connection, context.delta
            )));
        }

        let mut touched = vec![context.connection];
        context.old_parent = None;
        if let Some(new_parent) = context.new_parent {
            if current_parent != Some(new_parent) {
                let old = diagram
                    .canvas_mut()
                    .set_parent(context.connection, new_parent, None)?;
                touched.extend([old.0, new_parent]);
                context.old_parent = Some(old);
            }
        }
        context.old_waypoints = Some(
            diagram
                .canvas_mut()
                .set_waypoints(context.connection, moved)?,
        );
        Ok(touched)
    }

    fn revert(&self, context: &ConnectionMove, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let mut touched = vec![context.connection];
        if let Some(waypoints) = &context.old_waypoints {
            diagram
                .canvas_mut()
                .set_waypoints(context.connection, waypoints.clone())?;
        }
        if let Some((parent, index)) = context.old_parent {
            let (current, _) = diagram
                .canvas_mut()
                .set_parent(context.connection, parent, Some(index))?;
            touched.extend([current, parent]);
        }
        Ok(touched)
    }
}

/// Context of `connection.updateWaypoints`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateWaypoints {
    pub connection: Id,
    pub waypoints: Vec<Point>,
    old_waypoints: Option<Vec<Point>>,
}

impl UpdateWaypoints {
    pub fn new(connection: Id, waypoints: Vec<Point>) -> Self {
        Self {
            connection,
            waypoints,
            old_waypoints: None,
        }
    }
}

pub(crate) struct UpdateWaypointsHandler;

impl TypedHandler for UpdateWaypointsHandler {
    type Ctx = UpdateWaypoints;

    fn execute(&self, context: &mut UpdateWaypoints, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let old = diagram
            .canvas_mut()
            .set_waypoints(context.connection, context.waypoints.clone())?;
        context.old_waypoints = Some(old);
        Ok(vec![context.connection])
    }

    fn revert(&self, context: &UpdateWaypoints, diagram: &mut Diagram) -> Result<Vec<Id>> {
        if let Some(waypoints) = &context.old_waypoints {
            diagram
                .canvas_mut()
                .set_waypoints(context.connection, waypoints.clone())?;
        }
        Ok(vec![context.connection])
    }
}

/// Context of `connection.layout`: re-routes a connection between its
/// current endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConnection {
    pub connection: Id,
    old_waypoints: Option<Vec<Point>>,
}

impl LayoutConnection {
    pub fn new(connection: Id) -> Self {
        Self {
            connection,
            old_waypoints: None,
        }
    }
}

pub(crate) struct LayoutConnectionHandler;

impl TypedHandler for LayoutConnectionHandler {
    type Ctx = LayoutConnection;

    fn execute(&self, context: &mut LayoutConnection, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let (source, target) = require_connection(diagram, context.connection)?;
        let waypoints = layout::route(diagram.canvas(), source, target)?;
        let old = diagram
            .canvas_mut()
            .set_waypoints(context.connection, waypoints)?;
        context.old_waypoints = Some(old);
        Ok(vec![context.connection])
    }

    fn revert(&self, context: &LayoutConnection, diagram: &mut Diagram) -> Result<Vec<Id>> {
        if let Some(waypoints) = &context.old_waypoints {
            diagram
                .canvas_mut()
                .set_waypoints(context.connection, waypoints.clone())?;
        }
        Ok(vec![context.connection])
    }
}
