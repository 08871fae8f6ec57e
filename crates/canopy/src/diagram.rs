//! The editing target: element tree plus semantic payload.

use canopy_core::{
    canvas::Canvas,
    element::Element,
    event::EventBus,
    identifier::Id,
    semantic::{SemanticModel, SemanticNode},
};

use crate::command::Tracked;

/// A diagram instance as the command handlers see it.
#[derive(Debug, Default)]
pub struct Diagram {
    canvas: Canvas,
    semantics: SemanticModel,
}

impl Diagram {
    pub fn new(events: EventBus) -> Self {
        Self {
            canvas: Canvas::new(events),
            semantics: SemanticModel::new(),
        }
    }

    pub(crate) fn from_parts(canvas: Canvas, semantics: SemanticModel) -> Self {
        Self { canvas, semantics }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub(crate) fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn semantics(&self) -> &SemanticModel {
        &self.semantics
    }

    pub(crate) fn semantics_mut(&mut self) -> &mut SemanticModel {
        &mut self.semantics
    }

    pub fn element(&self, id: Id) -> Option<&Element> {
        self.canvas.get(id)
    }

    /// Whether `id` names an element or a business object.
    pub fn is_taken(&self, id: Id) -> bool {
        self.canvas.contains(id) || self.semantics.contains(id)
    }

    /// The business object an element visualizes.
    pub fn business_object(&self, id: Id) -> Option<&SemanticNode> {
        self.canvas
            .get(id)
            .and_then(Element::business_object)
            .and_then(|node| self.semantics.node(node))
    }
}

impl Tracked for Diagram {
    fn is_live(&self, id: Id) -> bool {
        self.canvas.contains(id)
    }
}
