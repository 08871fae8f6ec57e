//! Optional editing features gated by the diagram type.
//!
//! Each feature is bootstrapped with the classifier result on import and
//! whenever an edit changes the diagram type. It decides for itself whether
//! it becomes active.

use std::fmt;

use log::info;

use canopy_core::identifier::Id;

use crate::{classify::DiagramType, config::FeaturesConfig, diagram::Diagram};

/// A feature module.
pub trait Feature: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Whether the feature is active for the current diagram.
    fn initialized(&self) -> bool;

    /// Called after every import, and after edits that change the diagram
    /// type.
    fn bootstrap(&mut self, diagram_type: DiagramType);
}

/// Editing support for diagrams that mix standalone processes and
/// collaborations.
///
/// When active, shapes appended to an element get their business object
/// under the source's semantic parent instead of under the visual parent's
/// business object. In a mixed diagram the visual parent is usually the
/// root, whose business object is the collaboration, not the process the
/// source belongs to.
#[derive(Debug, Clone)]
pub struct MixedDiagramSupport {
    enabled: bool,
    initialized: bool,
}

impl MixedDiagramSupport {
    pub const NAME: &'static str = "mixedDiagramSupport";

    pub fn new(config: &FeaturesConfig) -> Self {
        Self {
            enabled: config.mixed_diagram_support(),
            initialized: false,
        }
    }

    /// Semantic parent for a shape appended to `source`, when this feature
    /// decides it.
    pub fn append_parent(&self, diagram: &Diagram, source: Id) -> Option<Id> {
        if !self.initialized {
            return None;
        }
        diagram.business_object(source).and_then(|node| node.parent())
    }
}

impl Feature for MixedDiagramSupport {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialized(&self) -> bool {
        self.initialized
    }

    fn bootstrap(&mut self, diagram_type: DiagramType) {
        self.initialized = self.enabled && diagram_type == DiagramType::Mixed;
        if self.initialized {
            info!(feature = Self::NAME; "Feature initialized");
        }
    }
}
