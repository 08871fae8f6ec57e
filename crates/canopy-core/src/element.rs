//! Diagram element variants and their capabilities.
//!
//! Every element is one of four [`ElementKind`]s. What an element may do is
//! derived from its kind, not inferred from its fields:
//!
//! | Kind         | container | connectable | labelable |
//! |--------------|-----------|-------------|-----------|
//! | `Root`       | yes       | no          | no        |
//! | `Shape`      | yes       | yes         | yes       |
//! | `Connection` | no        | yes         | yes       |
//! | `Label`      | no        | no          | no        |
//!
//! Relationships (`parent`, `children`, `incoming`, `outgoing`, `label`) are
//! stored as ids and are only rewired by [`Canvas`](crate::canvas::Canvas).
//! This module is a value layer: it constructs and validates elements.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::CanvasError,
    geometry::{Bounds, Point},
    identifier::Id,
};

/// Discriminator of the four element variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Root,
    Shape,
    Connection,
    Label,
}

impl ElementKind {
    /// Whether elements of this kind own children.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Root | Self::Shape)
    }

    /// Whether elements of this kind can be a connection endpoint.
    pub fn is_connectable(self) -> bool {
        matches!(self, Self::Shape | Self::Connection)
    }

    /// Whether elements of this kind can carry a label.
    pub fn is_labelable(self) -> bool {
        matches!(self, Self::Shape | Self::Connection)
    }

    /// Whether an element of this kind may be the structural parent of `child`.
    ///
    /// The root is never a child and only containers own children.
    pub fn can_contain(self, child: ElementKind) -> bool {
        self.is_container() && child != Self::Root
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Root => "root",
            Self::Shape => "shape",
            Self::Connection => "connection",
            Self::Label => "label",
        };
        write!(f, "{name}")
    }
}

/// Variant-specific element data.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementData {
    Root,
    Shape {
        bounds: Bounds,
    },
    Connection {
        source: Id,
        target: Id,
        waypoints: Vec<Point>,
    },
    Label {
        target: Id,
        bounds: Bounds,
        text: String,
    },
}

/// A diagram element.
///
/// Fields are read through accessors. Relationship fields are written by the
/// canvas only, so they cannot drift out of sync with their back-references.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    id: Id,
    element_type: String,
    business_object: Option<Id>,
    parent: Option<Id>,
    children: Vec<Id>,
    incoming: Vec<Id>,
    outgoing: Vec<Id>,
    label: Option<Id>,
    data: ElementData,
}

impl Element {
    fn with_data(id: Id, element_type: impl Into<String>, data: ElementData) -> Self {
        Self {
            id,
            element_type: element_type.into(),
            business_object: None,
            parent: None,
            children: Vec::new(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
            label: None,
            data,
        }
    }

    /// Creates the root element of a diagram.
    pub fn root(id: Id, element_type: impl Into<String>) -> Self {
        Self::with_data(id, element_type, ElementData::Root)
    }

    /// Creates a detached shape.
    pub fn shape(id: Id, element_type: impl Into<String>, bounds: Bounds) -> Self {
        Self::with_data(id, element_type, ElementData::Shape { bounds })
    }

    /// Creates a detached connection between two endpoints.
    pub fn connection(
        id: Id,
        element_type: impl Into<String>,
        source: Id,
        target: Id,
        waypoints: Vec<Point>,
    ) -> Self {
        Self::with_data(
            id,
            element_type,
            ElementData::Connection {
                source,
                target,
                waypoints,
            },
        )
    }

    /// Creates a detached label for `target`.
    pub fn label(
        id: Id,
        element_type: impl Into<String>,
        target: Id,
        bounds: Bounds,
        text: impl Into<String>,
    ) -> Self {
        Self::with_data(
            id,
            element_type,
            ElementData::Label {
                target,
                bounds,
                text: text.into(),
            },
        )
    }

    /// Attaches a business object reference (builder style).
    pub fn with_business_object(mut self, business_object: Option<Id>) -> Self {
        self.business_object = business_object;
        self
    }

    /// Checks the variant-specific fields.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidOperation`] for an empty type, non-finite
    /// geometry, or a negative size.
    pub fn validate(&self) -> Result<(), CanvasError> {
        if self.element_type.trim().is_empty() {
            return Err(CanvasError::InvalidOperation(format!(
                "element `{}` has an empty type",
                self.id
            )));
        }

        match &self.data {
            ElementData::Root => Ok(()),
            ElementData::Shape { bounds } | ElementData::Label { bounds, .. } => {
                if bounds.is_valid() {
                    Ok(())
                } else {
                    Err(CanvasError::InvalidOperation(format!(
                        "element `{}` has invalid bounds {bounds:?}",
                        self.id
                    )))
                }
            }
            ElementData::Connection { waypoints, .. } => {
                if waypoints.iter().all(|point| point.is_finite()) {
                    Ok(())
                } else {
                    Err(CanvasError::InvalidOperation(format!(
                        "connection `{}` has non-finite waypoints",
                        self.id
                    )))
                }
            }
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// The semantic type discriminator, e.g. `bpmn:Task`.
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn kind(&self) -> ElementKind {
        match self.data {
            ElementData::Root => ElementKind::Root,
            ElementData::Shape { .. } => ElementKind::Shape,
            ElementData::Connection { .. } => ElementKind::Connection,
            ElementData::Label { .. } => ElementKind::Label,
        }
    }

    pub fn data(&self) -> &ElementData {
        &self.data
    }

    pub fn business_object(&self) -> Option<Id> {
        self.business_object
    }

    pub fn parent(&self) -> Option<Id> {
        self.parent
    }

    /// Children in render order.
    pub fn children(&self) -> &[Id] {
        &self.children
    }

    pub fn incoming(&self) -> &[Id] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[Id] {
        &self.outgoing
    }

    /// The label annotating this element, if any.
    pub fn label_id(&self) -> Option<Id> {
        self.label
    }

    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    pub fn is_connectable(&self) -> bool {
        self.kind().is_connectable()
    }

    pub fn is_labelable(&self) -> bool {
        self.kind().is_labelable()
    }

    /// Geometry of shapes and labels.
    pub fn bounds(&self) -> Option<Bounds> {
        match &self.data {
            ElementData::Shape { bounds } | ElementData::Label { bounds, .. } => Some(*bounds),
            _ => None,
        }
    }

    /// Source and target of a connection.
    pub fn endpoints(&self) -> Option<(Id, Id)> {
        match &self.data {
            ElementData::Connection { source, target, .. } => Some((*source, *target)),
            _ => None,
        }
    }

    pub fn waypoints(&self) -> Option<&[Point]> {
        match &self.data {
            ElementData::Connection { waypoints, .. } => Some(waypoints),
            _ => None,
        }
    }

    /// The element a label annotates.
    pub fn label_target(&self) -> Option<Id> {
        match &self.data {
            ElementData::Label { target, .. } => Some(*target),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.data {
            ElementData::Label { text, .. } => Some(text),
            _ => None,
        }
    }

    /// A point representing the element for routing purposes.
    ///
    /// Shapes and labels use their center, connections the midpoint of their
    /// route.
    pub fn anchor(&self) -> Option<Point> {
        match &self.data {
            ElementData::Root => None,
            ElementData::Shape { bounds } | ElementData::Label { bounds, .. } => {
                Some(bounds.center())
            }
            ElementData::Connection { waypoints, .. } => match (waypoints.first(), waypoints.last())
            {
                (Some(first), Some(last)) => Some(first.midpoint(*last)),
                _ => None,
            },
        }
    }

    pub(crate) fn set_parent_id(&mut self, parent: Option<Id>) {
        self.parent = parent;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Id> {
        &mut self.children
    }

    pub(crate) fn incoming_mut(&mut self) -> &mut Vec<Id> {
        &mut self.incoming
    }

    pub(crate) fn outgoing_mut(&mut self) -> &mut Vec<Id> {
        &mut self.outgoing
    }

    pub(crate) fn set_label_id(&mut self, label: Option<Id>) {
        self.label = label;
    }

    pub(crate) fn data_mut(&mut self) -> &mut ElementData {
        &mut self.data
    }

    /// Returns a copy without any relationship, as stored before attaching.
    pub(crate) fn detached(&self) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
            label: None,
            ..self.clone()
        }
    }
}

/// Serializable description of an element in an import payload.
///
/// The `kind` key selects the variant. `parent` defaults to the diagram root.
///
/// ```
/// # use canopy_core::element::ElementSpec;
/// let spec: ElementSpec = toml::from_str(r#"
///     kind = "shape"
///     id = "Task_1"
///     type = "bpmn:Task"
///     bounds = { x = 100.0, y = 80.0, width = 100.0, height = 80.0 }
/// "#).unwrap();
/// assert_eq!(spec.id(), "Task_1");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementSpec {
    Shape {
        id: Id,
        #[serde(rename = "type")]
        element_type: String,
        bounds: Bounds,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<Id>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        business_object: Option<Id>,
    },
    Connection {
        id: Id,
        #[serde(rename = "type")]
        element_type: String,
        source: Id,
        target: Id,
        #[serde(default)]
        waypoints: Vec<Point>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<Id>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        business_object: Option<Id>,
    },
    Label {
        id: Id,
        #[serde(rename = "type", default = "default_label_type")]
        element_type: String,
        target: Id,
        bounds: Bounds,
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<Id>,
    },
}

fn default_label_type() -> String {
    "label".to_string()
}

impl ElementSpec {
    pub fn id(&self) -> Id {
        match self {
            Self::Shape { id, .. } | Self::Connection { id, .. } | Self::Label { id, .. } => *id,
        }
    }

    /// Explicit parent, `None` meaning the diagram root.
    pub fn parent(&self) -> Option<Id> {
        match self {
            Self::Shape { parent, .. }
            | Self::Connection { parent, .. }
            | Self::Label { parent, .. } => *parent,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Shape { .. } => ElementKind::Shape,
            Self::Connection { .. } => ElementKind::Connection,
            Self::Label { .. } => ElementKind::Label,
        }
    }

    /// Builds the detached element this spec describes.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidOperation`] if the element fails
    /// [`Element::validate`].
    pub fn to_element(&self) -> Result<Element, CanvasError> {
        let element = match self {
            Self::Shape {
                id,
                element_type,
                bounds,
                business_object,
                ..
            } => Element::shape(*id, element_type.as_str(), *bounds)
                .with_business_object(*business_object),
            Self::Connection {
                id,
                element_type,
                source,
                target,
                waypoints,
                business_object,
                ..
            } => Element::connection(
                *id,
                element_type.as_str(),
                *source,
                *target,
                waypoints.clone(),
            )
            .with_business_object(*business_object),
            Self::Label {
                id,
                element_type,
                target,
                bounds,
                text,
                ..
            } => Element::label(*id, element_type.as_str(), *target, *bounds, text.as_str()),
        };
        element.validate()?;
        Ok(element)
    }

    /// Describes an attached element. Returns `None` for the root.
    pub fn from_element(element: &Element) -> Option<Self> {
        let id = element.id();
        let element_type = element.element_type().to_string();
        let parent = element.parent();
        match element.kind() {
            ElementKind::Root => None,
            ElementKind::Shape => Some(Self::Shape {
                id,
                element_type,
                bounds: element.bounds()?,
                parent,
                business_object: element.business_object(),
            }),
            ElementKind::Connection => {
                let (source, target) = element.endpoints()?;
                Some(Self::Connection {
                    id,
                    element_type,
                    source,
                    target,
                    waypoints: element.waypoints().unwrap_or_default().to_vec(),
                    parent,
                    business_object: element.business_object(),
                })
            }
            ElementKind::Label => Some(Self::Label {
                id,
                element_type,
                target: element.label_target()?,
                bounds: element.bounds()?,
                text: element.text().unwrap_or_default().to_string(),
                parent,
            }),
        }
    }
}
