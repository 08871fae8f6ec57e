//! Diagram payloads: building a diagram from one and describing a diagram
//! as one.

use std::collections::HashSet;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use canopy_core::{
    canvas::Canvas,
    element::{Element, ElementSpec},
    event::EventBus,
    identifier::Id,
    semantic::{SemanticModel, SemanticPayload},
    CanvasError,
};

use crate::{diagram::Diagram, error::Result};

/// The root element of an imported diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootSpec {
    pub id: Id,
    #[serde(rename = "type", default = "default_root_type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_object: Option<Id>,
}

fn default_root_type() -> String {
    "root".to_string()
}

impl Default for RootSpec {
    fn default() -> Self {
        Self {
            id: Id::new("Root"),
            element_type: default_root_type(),
            business_object: None,
        }
    }
}

/// Everything needed to load a diagram.
///
/// Elements are added in order, so parents, connection endpoints and label
/// targets must appear before the elements that refer to them.
///
/// ```
/// # use canopy::DiagramPayload;
/// let payload: DiagramPayload = toml::from_str(r#"
///     [semantic]
///     root = "Definitions_1"
///     nodes = [
///         { id = "Definitions_1", kind = "bpmn:Definitions" },
///         { id = "Process_1", kind = "bpmn:Process", parent = "Definitions_1" },
///     ]
///
///     [root]
///     id = "Process_1_di"
///     business_object = "Process_1"
/// "#).unwrap();
///
/// assert!(payload.elements.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramPayload {
    #[serde(default)]
    pub semantic: SemanticPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<RootSpec>,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
}

/// Builds a diagram from `payload` without emitting any event.
///
/// # Errors
///
/// Returns the first structural problem: duplicate ids, unknown parents,
/// endpoints, targets or business objects, or invalid element data.
pub(crate) fn build(payload: DiagramPayload) -> Result<Diagram> {
    let mut semantics = SemanticModel::from_payload(payload.semantic)?;
    let mut canvas = Canvas::new(EventBus::new());

    let root = payload.root.unwrap_or_default();
    let root_id = root.id;
    let mut bindings: Vec<(Id, Id)> = Vec::new();
    if let Some(node) = root.business_object {
        bindings.push((node, root_id));
    }
    canvas.set_root(
        Element::root(root_id, root.element_type).with_business_object(root.business_object),
    )?;

    for spec in &payload.elements {
        let element = spec.to_element()?;
        if let Some(node) = element.business_object() {
            bindings.push((node, element.id()));
        }
        let parent = spec.parent().unwrap_or(root_id);
        canvas.add_element(element, parent, None)?;
        trace!(element:? = spec.id(), kind:? = spec.kind(); "Imported element");
    }

    for (node, element) in bindings {
        if !semantics.contains(node) {
            return Err(CanvasError::NotFound(node).into());
        }
        semantics.link(node, element);
    }

    canvas.check_integrity()?;
    debug!(elements = canvas.registry().len(), nodes = semantics.len(); "Diagram built");
    Ok(Diagram::from_parts(canvas, semantics))
}

/// Describes `diagram` as a payload that [`build`] accepts again.
///
/// Elements are listed so that every parent, endpoint and label target comes
/// before the elements referring to it.
pub(crate) fn export(diagram: &Diagram) -> DiagramPayload {
    let canvas = diagram.canvas();
    let semantic = diagram.semantics().to_payload();
    let Some(root) = canvas.root().and_then(|id| canvas.get(id)) else {
        return DiagramPayload {
            semantic,
            root: None,
            elements: Vec::new(),
        };
    };

    let mut emitted: HashSet<Id> = HashSet::from([root.id()]);
    let mut pending = canvas.descendants(root.id());
    let mut elements = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|id| {
            let Some(element) = canvas.get(*id) else {
                return false;
            };
            let ready = element.parent().is_none_or(|parent| emitted.contains(&parent))
                && element
                    .endpoints()
                    .is_none_or(|(source, target)| {
                        emitted.contains(&source) && emitted.contains(&target)
                    })
                && element
                    .label_target()
                    .is_none_or(|target| emitted.contains(&target));
            if !ready {
                return true;
            }
            if let Some(spec) = ElementSpec::from_element(element) {
                elements.push(spec);
            }
            emitted.insert(*id);
            false
        });
        if pending.len() == before {
            debug!(unresolved = pending.len(); "Export stopped on unresolved references");
            break;
        }
    }

    DiagramPayload {
        semantic,
        root: Some(RootSpec {
            id: root.id(),
            element_type: root.element_type().to_string(),
            business_object: root.business_object(),
        }),
        elements,
    }
}
