//! Configuration types for Canopy modeling.
//!
//! This module provides configuration structures that control editing
//! behavior. All types implement [`serde::Deserialize`] for loading from
//! external sources, and every field falls back to a default when missing.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining all sections.
//! - [`HistoryConfig`] - Bounds on the undo history.
//! - [`ModelingConfig`] - Sizes and spacing used when creating elements.
//! - [`RulesConfig`] - Connection rules applied by [`BasicRules`](crate::rules::BasicRules).
//! - [`ClassifierConfig`] - Vocabulary the diagram classifier recognizes.
//! - [`FeaturesConfig`] - Feature switches.
//!
//! # Example
//!
//! ```
//! # use canopy::config::AppConfig;
//! let config: AppConfig = toml::from_str(r#"
//!     [history]
//!     max_transactions = 20
//! "#).unwrap();
//!
//! assert_eq!(config.history().max_transactions(), Some(20));
//! assert_eq!(config.modeling().append_spacing(), 50.0);
//! ```

use serde::Deserialize;

use canopy_core::geometry::Size;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    history: HistoryConfig,

    #[serde(default)]
    modeling: ModelingConfig,

    #[serde(default)]
    rules: RulesConfig,

    #[serde(default)]
    classifier: ClassifierConfig,

    #[serde(default)]
    features: FeaturesConfig,
}

impl AppConfig {
    /// Returns the history configuration.
    pub fn history(&self) -> &HistoryConfig {
        &self.history
    }

    /// Returns the modeling configuration.
    pub fn modeling(&self) -> &ModelingConfig {
        &self.modeling
    }

    /// Returns the connection rules configuration.
    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Returns the classifier vocabulary.
    pub fn classifier(&self) -> &ClassifierConfig {
        &self.classifier
    }

    /// Returns the feature switches.
    pub fn features(&self) -> &FeaturesConfig {
        &self.features
    }

    /// Replaces the history section (builder style).
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    /// Replaces the feature section (builder style).
    pub fn with_features(mut self, features: FeaturesConfig) -> Self {
        self.features = features;
        self
    }
}

/// Undo history bounds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of transactions kept. Unbounded when absent.
    #[serde(default)]
    max_transactions: Option<usize>,
}

impl HistoryConfig {
    pub fn new(max_transactions: Option<usize>) -> Self {
        Self { max_transactions }
    }

    pub fn max_transactions(&self) -> Option<usize> {
        self.max_transactions
    }
}

/// Sizes and spacing used by the modeling operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelingConfig {
    default_shape_size: Size,
    append_spacing: f32,
    label_size: Size,
    connection_type: String,
}

impl Default for ModelingConfig {
    fn default() -> Self {
        Self {
            default_shape_size: Size::new(100.0, 80.0),
            append_spacing: 50.0,
            label_size: Size::new(90.0, 20.0),
            connection_type: "bpmn:SequenceFlow".to_string(),
        }
    }
}

impl ModelingConfig {
    /// Size of shapes created without explicit dimensions.
    pub fn default_shape_size(&self) -> Size {
        self.default_shape_size
    }

    /// Horizontal gap between an appended shape and its source.
    pub fn append_spacing(&self) -> f32 {
        self.append_spacing
    }

    /// Size of labels created by `update_label`.
    pub fn label_size(&self) -> Size {
        self.label_size
    }

    /// Type of connections created without an explicit type.
    pub fn connection_type(&self) -> &str {
        &self.connection_type
    }
}

/// Connection rules: element types that may not start or end a connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    no_outgoing: Vec<String>,
    no_incoming: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            no_outgoing: vec!["bpmn:EndEvent".to_string()],
            no_incoming: vec!["bpmn:StartEvent".to_string()],
        }
    }
}

impl RulesConfig {
    /// Types that cannot be a connection source.
    pub fn no_outgoing(&self) -> &[String] {
        &self.no_outgoing
    }

    /// Types that cannot be a connection target.
    pub fn no_incoming(&self) -> &[String] {
        &self.no_incoming
    }
}

/// Semantic kinds the diagram classifier recognizes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    process_kinds: Vec<String>,
    collaboration_kinds: Vec<String>,
    participant_kinds: Vec<String>,
    process_ref_attribute: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            process_kinds: vec!["bpmn:Process".to_string()],
            collaboration_kinds: vec!["bpmn:Collaboration".to_string()],
            participant_kinds: vec!["bpmn:Participant".to_string()],
            process_ref_attribute: "processRef".to_string(),
        }
    }
}

impl ClassifierConfig {
    pub fn process_kinds(&self) -> &[String] {
        &self.process_kinds
    }

    pub fn collaboration_kinds(&self) -> &[String] {
        &self.collaboration_kinds
    }

    pub fn participant_kinds(&self) -> &[String] {
        &self.participant_kinds
    }

    /// Attribute on participants naming the process they display.
    pub fn process_ref_attribute(&self) -> &str {
        &self.process_ref_attribute
    }

    pub fn is_process(&self, kind: &str) -> bool {
        self.process_kinds.iter().any(|k| k == kind)
    }

    pub fn is_collaboration(&self, kind: &str) -> bool {
        self.collaboration_kinds.iter().any(|k| k == kind)
    }

    pub fn is_participant(&self, kind: &str) -> bool {
        self.participant_kinds.iter().any(|k| k == kind)
    }
}

/// Feature switches.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    mixed_diagram_support: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            mixed_diagram_support: true,
        }
    }
}

impl FeaturesConfig {
    pub fn new(mixed_diagram_support: bool) -> Self {
        Self {
            mixed_diagram_support,
        }
    }

    /// Whether mixed process/collaboration editing may be activated.
    pub fn mixed_diagram_support(&self) -> bool {
        self.mixed_diagram_support
    }
}
