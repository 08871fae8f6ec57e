//! Editing scripts: a list of modeling steps applied to a loaded diagram.
//!
//! A script is a TOML document with one `[[step]]` table per operation:
//!
//! ```toml
//! [[step]]
//! action = "append"
//! source = "StartEvent_1_di"
//! type = "bpmn:Task"
//!
//! [[step]]
//! action = "label"
//! target = "Task_1"
//! text = "Review order"
//!
//! [[step]]
//! action = "undo"
//! ```
//!
//! Shapes and connections created by a step get generated ids such as
//! `Task_1` or `SequenceFlow_1`, which later steps can refer to.

use log::{info, warn};
use serde::Deserialize;

use canopy::{
    Modeler, ModelingError,
    geometry::{Bounds, Point},
    identifier::Id,
};

/// A parsed editing script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// One modeling operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Create {
        #[serde(rename = "type")]
        element_type: String,
        bounds: Bounds,
        #[serde(default)]
        parent: Option<Id>,
    },
    Append {
        source: Id,
        #[serde(rename = "type")]
        element_type: String,
        #[serde(default)]
        bounds: Option<Bounds>,
    },
    Connect {
        source: Id,
        target: Id,
        #[serde(default, rename = "type")]
        connection_type: Option<String>,
    },
    Move {
        elements: Vec<Id>,
        #[serde(default)]
        dx: f32,
        #[serde(default)]
        dy: f32,
        #[serde(default)]
        parent: Option<Id>,
    },
    Resize {
        shape: Id,
        bounds: Bounds,
    },
    Delete {
        elements: Vec<Id>,
    },
    Label {
        target: Id,
        #[serde(default)]
        text: String,
    },
    Waypoints {
        connection: Id,
        points: Vec<Point>,
    },
    Layout {
        connection: Id,
    },
    Undo,
    Redo,
}

impl Step {
    /// The `action` name of this step.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Append { .. } => "append",
            Self::Connect { .. } => "connect",
            Self::Move { .. } => "move",
            Self::Resize { .. } => "resize",
            Self::Delete { .. } => "delete",
            Self::Label { .. } => "label",
            Self::Waypoints { .. } => "waypoints",
            Self::Layout { .. } => "layout",
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }

    /// Runs the step against `modeler`.
    ///
    /// # Errors
    ///
    /// Returns the modeling error of the underlying operation. The diagram is
    /// unchanged by a failed step.
    pub fn apply(&self, modeler: &mut Modeler) -> Result<(), ModelingError> {
        match self {
            Self::Create {
                element_type,
                bounds,
                parent,
            } => {
                let shape = modeler.create_shape(element_type, *bounds, *parent)?;
                info!(shape:% = shape; "Shape created");
            }
            Self::Append {
                source,
                element_type,
                bounds,
            } => {
                let appended = modeler.append_shape(*source, element_type, *bounds)?;
                info!(
                    shape:% = appended.shape,
                    connection:% = appended.connection;
                    "Shape appended"
                );
            }
            Self::Connect {
                source,
                target,
                connection_type,
            } => {
                let connection = modeler.connect(*source, *target, connection_type.as_deref())?;
                info!(connection:% = connection; "Elements connected");
            }
            Self::Move {
                elements,
                dx,
                dy,
                parent,
            } => modeler.move_elements(elements, Point::new(*dx, *dy), *parent)?,
            Self::Resize { shape, bounds } => modeler.resize_shape(*shape, *bounds)?,
            Self::Delete { elements } => modeler.delete_elements(elements)?,
            Self::Label { target, text } => modeler.update_label(*target, text)?,
            Self::Waypoints { connection, points } => {
                modeler.update_waypoints(*connection, points.clone())?;
            }
            Self::Layout { connection } => modeler.layout_connection(*connection)?,
            Self::Undo => {
                if !modeler.undo()? {
                    warn!("Nothing to undo");
                }
            }
            Self::Redo => {
                if !modeler.redo()? {
                    warn!("Nothing to redo");
                }
            }
        }
        Ok(())
    }
}
