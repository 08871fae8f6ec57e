//! Canopy - Transactional editing for hierarchical diagrams.
//!
//! Canopy keeps a diagram as a tree of elements (shapes, connections and
//! labels under a single root), each visualizing a business object of a
//! semantic payload. Every edit runs as a command on an undoable stack, and
//! compound edits such as appending a shape or deleting a selection become one
//! transaction.
//!
//! The [`Modeler`] is the entry point: it owns the diagram, the command stack,
//! the rules and the optional features, and exposes the modeling operations.

pub mod classify;
pub mod command;
pub mod config;
pub mod diagram;
pub mod features;
pub mod layout;
pub mod modeling;
pub mod rules;

mod error;
mod payload;

pub use canopy_core::{
    canvas, element, event, geometry, identifier, registry, semantic, CanvasError,
};

pub use error::{ModelingError, Result};
pub use payload::{DiagramPayload, RootSpec};

use std::rc::Rc;

use log::{debug, info, trace};

use canopy_core::{
    event::{Event, EventBus},
    geometry::{Bounds, Point},
    identifier::{prefix_for_type, Id, IdGenerator},
};

use classify::DiagramType;
use command::CommandHandler;
use config::AppConfig;
use diagram::Diagram;
use features::{Feature, MixedDiagramSupport};
use modeling::{
    connection::{ConnectionCreate, LayoutConnection, UpdateWaypoints},
    elements::{ElementsDelete, ElementsMove},
    label::LabelUpdate,
    shape::{ShapeAppend, ShapeCreate, ShapeResize},
    CommandContext, Context, ModelingStack,
};
use rules::{BasicRules, Rules};

/// Editor for one diagram at a time.
///
/// # Examples
///
/// ```rust
/// use canopy::{Modeler, config::AppConfig, geometry::Bounds};
///
/// let mut modeler = Modeler::new(AppConfig::default())?;
///
/// let start = modeler.create_shape("bpmn:StartEvent", Bounds::new(0.0, 0.0, 36.0, 36.0), None)?;
/// let task = modeler.append_shape(start, "bpmn:Task", None)?.shape;
/// assert!(modeler.diagram().element(task).is_some());
///
/// // The append is one transaction.
/// modeler.undo()?;
/// assert!(modeler.diagram().element(task).is_none());
/// # Ok::<(), canopy::ModelingError>(())
/// ```
pub struct Modeler {
    config: AppConfig,
    events: EventBus,
    diagram: Diagram,
    stack: ModelingStack,
    ids: IdGenerator,
    diagram_type: DiagramType,
    mixed_support: MixedDiagramSupport,
    rules: Rc<dyn Rules>,
}

impl Modeler {
    /// Creates a modeler with the configured [`BasicRules`] and an empty
    /// diagram holding only a root.
    ///
    /// # Errors
    ///
    /// Returns an error if the modeling commands cannot be registered.
    pub fn new(config: AppConfig) -> Result<Self> {
        let rules = Rc::new(BasicRules::new(config.rules().clone()));
        Self::with_rules(config, rules)
    }

    /// Creates a modeler with custom connection rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the modeling commands cannot be registered.
    pub fn with_rules(config: AppConfig, rules: Rc<dyn Rules>) -> Result<Self> {
        let events = EventBus::new();
        let mut diagram = payload::build(DiagramPayload::default())?;
        diagram.canvas_mut().set_events(events.clone());

        let mut stack = ModelingStack::new(events.clone())
            .with_max_transactions(config.history().max_transactions());
        modeling::register_handlers(&mut stack, &config, Rc::clone(&rules))?;

        let mixed_support = MixedDiagramSupport::new(config.features());
        debug!(
            max_transactions:? = config.history().max_transactions();
            "Modeler created"
        );

        Ok(Self {
            config,
            events,
            diagram,
            stack,
            ids: IdGenerator::new(),
            diagram_type: DiagramType::None,
            mixed_support,
            rules,
        })
    }

    /// Replaces the current diagram with `payload`.
    ///
    /// The payload is validated completely before anything changes. On success
    /// the history is cleared, the diagram is classified, the features are
    /// bootstrapped and an [`Event::ImportDone`] is emitted.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem of the payload. The current
    /// diagram is kept in that case.
    pub fn import(&mut self, incoming: DiagramPayload) -> Result<DiagramType> {
        info!(
            nodes = incoming.semantic.nodes.len(),
            elements = incoming.elements.len();
            "Importing diagram"
        );
        let mut diagram = payload::build(incoming)?;
        diagram.canvas_mut().set_events(self.events.clone());
        self.diagram = diagram;
        self.stack.clear();
        self.ids.reset();

        self.diagram_type = classify::classify(self.diagram.semantics(), self.config.classifier());
        self.mixed_support.bootstrap(self.diagram_type);

        let elements = self.diagram.canvas().registry().len();
        self.events.emit(&Event::ImportDone { elements });
        info!(diagram_type:% = self.diagram_type, elements; "Import done");
        Ok(self.diagram_type)
    }

    /// Describes the current diagram as a payload [`Modeler::import`] accepts.
    pub fn export(&self) -> DiagramPayload {
        payload::export(&self.diagram)
    }

    /// Creates a shape under `parent`, or under the root when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent is missing or cannot hold shapes, or if
    /// the bounds are invalid.
    pub fn create_shape(
        &mut self,
        element_type: &str,
        bounds: Bounds,
        parent: Option<Id>,
    ) -> Result<Id> {
        let parent = self.parent_or_root(parent)?;
        let shape = self.fresh_id(element_type);
        self.execute(ShapeCreate::new(shape, element_type, bounds, parent))?;
        Ok(shape)
    }

    /// Appends a new shape to `source` and connects the two.
    ///
    /// The shape goes next to the source's parent, to the right of the source
    /// unless `bounds` are given. Returns the final context, which names the
    /// created shape and connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is missing, cannot be connected, or the
    /// rules refuse a connection to `element_type`.
    pub fn append_shape(
        &mut self,
        source: Id,
        element_type: &str,
        bounds: Option<Bounds>,
    ) -> Result<ShapeAppend> {
        let bounds = match bounds {
            Some(bounds) => bounds,
            None => self.append_bounds(source)?,
        };
        let shape = self.fresh_id(element_type);
        let connection_type = self.config.modeling().connection_type().to_string();
        let connection = self.fresh_id(&connection_type);
        let semantic_parent = self.mixed_support.append_parent(&self.diagram, source);
        trace!(source:? = source, semantic_parent:? = semantic_parent; "Append placement");

        self.execute(ShapeAppend {
            source,
            shape,
            element_type: element_type.to_string(),
            bounds,
            connection,
            connection_type,
            semantic_parent,
        })
    }

    /// Connects `source` to `target` with a connection of `connection_type`,
    /// or of the configured default type.
    ///
    /// # Errors
    ///
    /// Returns an error if either endpoint is missing or not connectable, or
    /// the rules refuse the connection.
    pub fn connect(
        &mut self,
        source: Id,
        target: Id,
        connection_type: Option<&str>,
    ) -> Result<Id> {
        let connection_type = connection_type
            .unwrap_or(self.config.modeling().connection_type())
            .to_string();
        let connection = self.fresh_id(&connection_type);
        self.execute(ConnectionCreate::new(
            connection,
            connection_type,
            source,
            target,
        ))?;
        Ok(connection)
    }

    /// Moves `elements` by `delta`, optionally into `new_parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if an element is missing or the root, or if the new
    /// parent is invalid for one of the moved elements.
    pub fn move_elements(
        &mut self,
        elements: &[Id],
        delta: Point,
        new_parent: Option<Id>,
    ) -> Result<()> {
        self.execute(ElementsMove::new(elements.to_vec(), delta).with_parent(new_parent))
            .map(drop)
    }

    /// Moves one shape, see [`Modeler::move_elements`].
    ///
    /// # Errors
    ///
    /// Same as [`Modeler::move_elements`].
    pub fn move_shape(&mut self, shape: Id, delta: Point, new_parent: Option<Id>) -> Result<()> {
        self.move_elements(&[shape], delta, new_parent)
    }

    /// Resizes a shape and re-lays out its connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is missing or the bounds are invalid.
    pub fn resize_shape(&mut self, shape: Id, bounds: Bounds) -> Result<()> {
        self.execute(ShapeResize::new(shape, bounds)).map(drop)
    }

    /// Deletes `elements` with everything that depends on them.
    ///
    /// # Errors
    ///
    /// Returns an error if an element is missing or the root.
    pub fn delete_elements(&mut self, elements: &[Id]) -> Result<()> {
        self.execute(ElementsDelete::new(elements.to_vec())).map(drop)
    }

    /// Sets the label text of `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is missing or cannot carry a label.
    pub fn update_label(&mut self, target: Id, text: &str) -> Result<()> {
        let needs_label = self
            .diagram
            .element(target)
            .is_some_and(|element| element.label_id().is_none() && !text.is_empty());
        let label = needs_label.then(|| self.fresh_label_id(target));
        self.execute(LabelUpdate::new(target, text).with_label(label))
            .map(drop)
    }

    /// Replaces the waypoints of a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is missing or the route is invalid.
    pub fn update_waypoints(&mut self, connection: Id, waypoints: Vec<Point>) -> Result<()> {
        self.execute(UpdateWaypoints::new(connection, waypoints))
            .map(drop)
    }

    /// Re-routes a connection between its endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is missing.
    pub fn layout_connection(&mut self, connection: Id) -> Result<()> {
        self.execute(LayoutConnection::new(connection)).map(drop)
    }

    /// Executes a typed command and returns its final context.
    ///
    /// # Errors
    ///
    /// Returns the handler's error. The diagram and history are unchanged then.
    pub fn execute<C: CommandContext>(&mut self, context: C) -> Result<C> {
        let result = self.execute_command(C::COMMAND, context.into_context())?;
        C::from_context(result).ok_or_else(|| ModelingError::ContextMismatch {
            command: C::COMMAND.to_string(),
        })
    }

    /// Executes the command registered under `command`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelingError::UnknownCommand`] for unregistered names, or the
    /// handler's error.
    pub fn execute_command(&mut self, command: &str, context: Context) -> Result<Context> {
        debug!(command; "Modeling operation");
        let result = self.stack.execute(&mut self.diagram, command, context)?;
        self.verify()?;
        self.reclassify();
        Ok(result)
    }

    /// Reverts the last transaction. Returns `false` when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot revert its change.
    pub fn undo(&mut self) -> Result<bool> {
        let undone = self.stack.undo(&mut self.diagram)?;
        self.verify()?;
        self.reclassify();
        Ok(undone)
    }

    /// Re-applies the next undone transaction. Returns `false` when there is
    /// none.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot re-apply its change.
    pub fn redo(&mut self) -> Result<bool> {
        let redone = self.stack.redo(&mut self.diagram)?;
        self.verify()?;
        self.reclassify();
        Ok(redone)
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    /// Registers an additional command.
    ///
    /// # Errors
    ///
    /// Returns [`ModelingError::DuplicateCommand`] if the name is taken.
    pub fn register_handler(
        &mut self,
        command: &str,
        handler: impl CommandHandler<Diagram, Context> + 'static,
    ) -> Result<()> {
        self.stack.register(command, handler)
    }

    /// The event bus observers subscribe to.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn stack(&self) -> &ModelingStack {
        &self.stack
    }

    /// Type of the current diagram. Computed on import and kept current
    /// across edits, undo and redo.
    pub fn diagram_type(&self) -> DiagramType {
        self.diagram_type
    }

    pub fn rules(&self) -> &dyn Rules {
        self.rules.as_ref()
    }

    pub fn features(&self) -> Vec<&dyn Feature> {
        let mixed: &dyn Feature = &self.mixed_support;
        vec![mixed]
    }

    /// Looks up a feature by name, e.g. `mixedDiagramSupport`.
    pub fn feature(&self, name: &str) -> Option<&dyn Feature> {
        self.features()
            .into_iter()
            .find(|feature| feature.name() == name)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn parent_or_root(&self, parent: Option<Id>) -> Result<Id> {
        parent
            .or_else(|| self.diagram.canvas().root())
            .ok_or_else(|| ModelingError::invalid("the diagram has no root"))
    }

    /// Default bounds for a shape appended to `source`: right of it,
    /// vertically centered.
    fn append_bounds(&self, source: Id) -> Result<Bounds> {
        let element = self.diagram.canvas().require(source)?;
        let bounds = element.bounds().ok_or_else(|| {
            ModelingError::invalid(format!("{} `{source}` has no bounds", element.kind()))
        })?;
        let modeling = self.config.modeling();
        let size = modeling.default_shape_size();
        let center = Point::new(
            bounds.max_x() + modeling.append_spacing() + size.width() / 2.0,
            bounds.center().y(),
        );
        Ok(Bounds::new_from_center(center, size))
    }

    fn fresh_id(&mut self, element_type: &str) -> Id {
        let diagram = &self.diagram;
        self.ids
            .next(prefix_for_type(element_type), |id| diagram.is_taken(id))
    }

    /// `<target>_label`, or `<target>_label_<n>` when that id is in use.
    fn fresh_label_id(&mut self, target: Id) -> Id {
        let preferred = target.with_suffix("label");
        if !self.diagram.is_taken(preferred) {
            return preferred;
        }
        let diagram = &self.diagram;
        self.ids
            .next(&preferred.to_string(), |id| diagram.is_taken(id))
    }

    /// Classifies the diagram again after an edit and re-bootstraps the
    /// features when the type changed.
    fn reclassify(&mut self) {
        let diagram_type = classify::classify(self.diagram.semantics(), self.config.classifier());
        if diagram_type != self.diagram_type {
            info!(from:% = self.diagram_type, to:% = diagram_type; "Diagram type changed");
            self.diagram_type = diagram_type;
            self.mixed_support.bootstrap(diagram_type);
        }
    }

    /// Structural self-check after each completed operation in debug builds.
    fn verify(&self) -> Result<()> {
        if cfg!(debug_assertions) {
            self.diagram.canvas().check_integrity()?;
        }
        Ok(())
    }
}
