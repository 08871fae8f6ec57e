//! Diagram type classification.
//!
//! The classifier looks at the top-level nodes of the semantic payload only.
//! It is a pure function: same payload and vocabulary, same answer.

use std::{collections::HashSet, fmt};

use log::debug;
use serde::Serialize;

use canopy_core::semantic::SemanticModel;

use crate::config::ClassifierConfig;

/// Which editing capabilities a diagram calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramType {
    /// A single standalone process.
    Process,
    /// A single collaboration whose participants reference every process.
    Collaboration,
    /// Constructs of more than one kind, or several of a kind.
    Mixed,
    /// Nothing recognizable at the top level.
    #[default]
    None,
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Process => "process",
            Self::Collaboration => "collaboration",
            Self::Mixed => "mixed",
            Self::None => "none",
        };
        write!(f, "{name}")
    }
}

/// Classifies a payload.
///
/// A process counts as standalone unless some participant anywhere in the
/// payload names it through the process reference attribute.
///
/// | collaborations | standalone processes | result          |
/// |----------------|----------------------|-----------------|
/// | 0              | 0                    | `None`          |
/// | 0              | 1                    | `Process`       |
/// | 1              | 0                    | `Collaboration` |
/// | any other mix  |                      | `Mixed`         |
pub fn classify(model: &SemanticModel, vocabulary: &ClassifierConfig) -> DiagramType {
    let referenced: HashSet<&str> = model
        .nodes()
        .filter(|node| vocabulary.is_participant(node.kind()))
        .filter_map(|node| node.attribute(vocabulary.process_ref_attribute()))
        .collect();

    let mut collaborations = 0usize;
    let mut standalone = 0usize;
    for node in model.top_level() {
        if vocabulary.is_collaboration(node.kind()) {
            collaborations += 1;
        } else if vocabulary.is_process(node.kind()) {
            let id = node.id().to_string();
            if !referenced.contains(id.as_str()) {
                standalone += 1;
            }
        }
    }

    let diagram_type = match (collaborations, standalone) {
        (0, 0) => DiagramType::None,
        (0, 1) => DiagramType::Process,
        (1, 0) => DiagramType::Collaboration,
        _ => DiagramType::Mixed,
    };
    debug!(collaborations, standalone, diagram_type:%; "Diagram classified");
    diagram_type
}
