//! Modeling operations as command handlers.
//!
//! Every edit is a registered command with a typed context. Compound edits
//! (append, delete, move) are composed from primitive commands executed in
//! `pre_execute`/`post_execute`, so a single user action becomes one
//! transaction whose entries undo in reverse.
//!
//! # Submodules
//!
//! - [`shape`] - `shape.create`, `shape.delete`, `shape.move`, `shape.resize`, `shape.append`
//! - [`connection`] - `connection.create`, `connection.delete`, `connection.move`,
//!   `connection.updateWaypoints`, `connection.layout`
//! - [`label`] - `label.create`, `label.delete`, `label.update`
//! - [`elements`] - `elements.move`, `elements.delete`

pub mod connection;
pub mod elements;
pub mod label;
pub mod shape;

use std::rc::Rc;

use canopy_core::{identifier::Id, semantic::SemanticNode};

use crate::{
    command::{CommandHandler, CommandStack, Scope},
    config::AppConfig,
    diagram::Diagram,
    error::{ModelingError, Result},
    rules::Rules,
};

use connection::{ConnectionCreate, ConnectionDelete, ConnectionMove, LayoutConnection, UpdateWaypoints};
use elements::{ElementsDelete, ElementsMove};
use label::{LabelCreate, LabelDelete, LabelUpdate};
use shape::{ShapeAppend, ShapeCreate, ShapeDelete, ShapeMove, ShapeResize};

/// Scope handed to modeling hooks.
pub type ModelingScope<'a> = Scope<'a, Diagram, Context>;

/// The command stack specialized for diagrams.
pub type ModelingStack = CommandStack<Diagram, Context>;

/// Context of any modeling command.
#[derive(Debug, Clone, PartialEq)]
pub enum Context {
    ShapeCreate(ShapeCreate),
    ShapeDelete(ShapeDelete),
    ShapeMove(ShapeMove),
    ShapeResize(ShapeResize),
    ShapeAppend(ShapeAppend),
    ConnectionCreate(ConnectionCreate),
    ConnectionDelete(ConnectionDelete),
    ConnectionMove(ConnectionMove),
    ConnectionUpdateWaypoints(UpdateWaypoints),
    ConnectionLayout(LayoutConnection),
    LabelCreate(LabelCreate),
    LabelDelete(LabelDelete),
    LabelUpdate(LabelUpdate),
    ElementsMove(ElementsMove),
    ElementsDelete(ElementsDelete),
}

/// A typed command context bound to its command name.
pub trait CommandContext: Sized + Clone {
    const COMMAND: &'static str;

    fn into_context(self) -> Context;
    fn from_context(context: Context) -> Option<Self>;
    fn from_ref(context: &Context) -> Option<&Self>;
    fn from_mut(context: &mut Context) -> Option<&mut Self>;
}

macro_rules! command_context {
    ($($ty:ident => $variant:ident, $name:literal;)*) => {
        $(
            impl CommandContext for $ty {
                const COMMAND: &'static str = $name;

                fn into_context(self) -> Context {
                    Context::$variant(self)
                }

                fn from_context(context: Context) -> Option<Self> {
                    match context {
                        Context::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn from_ref(context: &Context) -> Option<&Self> {
                    match context {
                        Context::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn from_mut(context: &mut Context) -> Option<&mut Self> {
                    match context {
                        Context::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Context {
                fn from(context: $ty) -> Self {
                    Context::$variant(context)
                }
            }
        )*

        impl Context {
            /// Name of the command this context belongs to.
            pub fn command(&self) -> &'static str {
                match self {
                    $(Context::$variant(_) => $name,)*
                }
            }
        }
    };
}

command_context! {
    ShapeCreate => ShapeCreate, "shape.create";
    ShapeDelete => ShapeDelete, "shape.delete";
    ShapeMove => ShapeMove, "shape.move";
    ShapeResize => ShapeResize, "shape.resize";
    ShapeAppend => ShapeAppend, "shape.append";
    ConnectionCreate => ConnectionCreate, "connection.create";
    ConnectionDelete => ConnectionDelete, "connection.delete";
    ConnectionMove => ConnectionMove, "connection.move";
    UpdateWaypoints => ConnectionUpdateWaypoints, "connection.updateWaypoints";
    LayoutConnection => ConnectionLayout, "connection.layout";
    LabelCreate => LabelCreate, "label.create";
    LabelDelete => LabelDelete, "label.delete";
    LabelUpdate => LabelUpdate, "label.update";
    ElementsMove => ElementsMove, "elements.move";
    ElementsDelete => ElementsDelete, "elements.delete";
}

/// A command handler working on one context type.
pub(crate) trait TypedHandler {
    type Ctx: CommandContext;

    fn pre_execute(&self, _context: &mut Self::Ctx, _scope: &mut ModelingScope<'_>) -> Result<()> {
        Ok(())
    }

    fn execute(&self, context: &mut Self::Ctx, diagram: &mut Diagram) -> Result<Vec<Id>>;

    fn revert(&self, context: &Self::Ctx, diagram: &mut Diagram) -> Result<Vec<Id>>;

    fn post_execute(&self, _context: &mut Self::Ctx, _scope: &mut ModelingScope<'_>) -> Result<()> {
        Ok(())
    }
}

/// Adapts a [`TypedHandler`] to the stack's [`CommandHandler`].
struct Typed<H>(H);

fn mismatch<C: CommandContext>() -> ModelingError {
    ModelingError::ContextMismatch {
        command: C::COMMAND.to_string(),
    }
}

impl<H: TypedHandler> CommandHandler<Diagram, Context> for Typed<H> {
    fn pre_execute(&self, context: &mut Context, scope: &mut ModelingScope<'_>) -> Result<()> {
        let context = H::Ctx::from_mut(context).ok_or_else(mismatch::<H::Ctx>)?;
        self.0.pre_execute(context, scope)
    }

    fn execute(&self, context: &mut Context, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let context = H::Ctx::from_mut(context).ok_or_else(mismatch::<H::Ctx>)?;
        self.0.execute(context, diagram)
    }

    fn revert(&self, context: &Context, diagram: &mut Diagram) -> Result<Vec<Id>> {
        let context = H::Ctx::from_ref(context).ok_or_else(mismatch::<H::Ctx>)?;
        self.0.revert(context, diagram)
    }

    fn post_execute(&self, context: &mut Context, scope: &mut ModelingScope<'_>) -> Result<()> {
        let context = H::Ctx::from_mut(context).ok_or_else(mismatch::<H::Ctx>)?;
        self.0.post_execute(context, scope)
    }
}

fn register<H>(stack: &mut ModelingStack, handler: H) -> Result<()>
where
    H: TypedHandler + 'static,
{
    stack.register(H::Ctx::COMMAND, Typed(handler))
}

/// Registers every modeling command on `stack`.
///
/// # Errors
///
/// Returns [`ModelingError::DuplicateCommand`] if any of the names is taken.
pub fn register_handlers(
    stack: &mut ModelingStack,
    config: &AppConfig,
    rules: Rc<dyn Rules>,
) -> Result<()> {
    let modeling = config.modeling().clone();

    register(stack, shape::CreateShapeHandler)?;
    register(stack, shape::DeleteShapeHandler)?;
    register(stack, shape::MoveShapeHandler)?;
    register(stack, shape::ResizeShapeHandler)?;
    register(stack, shape::AppendShapeHandler::new(Rc::clone(&rules)))?;
    register(stack, connection::CreateConnectionHandler::new(Rc::clone(&rules)))?;
    register(stack, connection::DeleteConnectionHandler)?;
    register(stack, connection::MoveConnectionHandler)?;
    register(stack, connection::UpdateWaypointsHandler)?;
    register(stack, connection::LayoutConnectionHandler)?;
    register(stack, label::CreateLabelHandler)?;
    register(stack, label::DeleteLabelHandler)?;
    register(stack, label::UpdateLabelHandler::new(modeling))?;
    register(stack, elements::MoveElementsHandler)?;
    register(stack, elements::DeleteElementsHandler)?;
    Ok(())
}

/// Executes a nested command and returns its typed final context.
pub(crate) fn run<C: CommandContext>(scope: &mut ModelingScope<'_>, context: C) -> Result<C> {
    let result = scope.execute(C::COMMAND, context.into_context())?;
    C::from_context(result).ok_or_else(mismatch::<C>)
}

/// Validates that a business object `id` can be created under `parent`.
pub(crate) fn check_business_object(
    diagram: &Diagram,
    id: Id,
    parent: Option<Id>,
) -> Result<()> {
    let semantics = diagram.semantics();
    if semantics.contains(id) {
        return Err(canopy_core::CanvasError::DuplicateId(id).into());
    }
    if let Some(parent) = parent {
        if !semantics.contains(parent) {
            return Err(canopy_core::CanvasError::NotFound(parent).into());
        }
    }
    Ok(())
}

/// Creates and links the business object of a freshly added element.
pub(crate) fn create_business_object(diagram: &mut Diagram, node: SemanticNode) -> Result<()> {
    let id = node.id();
    let semantics = diagram.semantics_mut();
    semantics.add_node(node)?;
    semantics.link(id, id);
    Ok(())
}

/// Removes the business object created together with `id`.
pub(crate) fn remove_business_object(diagram: &mut Diagram, id: Id) -> Result<()> {
    if diagram.semantics().contains(id) {
        diagram.semantics_mut().remove_node(id)?;
    }
    Ok(())
}

/// Business object detached from the semantic tree by a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedBusinessObject {
    node: Id,
    parent: Option<Id>,
}

/// Detaches and unlinks the business object of `element`, if it has one.
pub(crate) fn detach_business_object(
    diagram: &mut Diagram,
    element: Id,
) -> Result<Option<DetachedBusinessObject>> {
    let Some(node) = diagram.element(element).and_then(|e| e.business_object()) else {
        return Ok(None);
    };
    if !diagram.semantics().contains(node) {
        return Ok(None);
    }
    let semantics = diagram.semantics_mut();
    let parent = semantics.set_parent(node, None)?;
    semantics.unlink(node);
    Ok(Some(DetachedBusinessObject { node, parent }))
}

/// Reverses [`detach_business_object`].
pub(crate) fn reattach_business_object(
    diagram: &mut Diagram,
    element: Id,
    detached: &DetachedBusinessObject,
) -> Result<()> {
    let semantics = diagram.semantics_mut();
    semantics.set_parent(detached.node, detached.parent)?;
    semantics.link(detached.node, element);
    Ok(())
}
