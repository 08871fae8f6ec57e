//! Pluggable modeling rules.
//!
//! Rules answer "is this edit allowed?" before any command runs. The
//! [`Modeler`](crate::Modeler) consults them for appends and connections.

use canopy_core::element::Element;

use crate::config::RulesConfig;

/// Decides which connections the modeling operations may create.
pub trait Rules {
    /// Whether `source` may get an outgoing connection to an element of
    /// `target_type`.
    fn can_connect(&self, source: &Element, target_type: &str) -> bool;
}

/// Rules driven by [`RulesConfig`]: connectable kinds only, and no
/// connections out of or into the configured element types.
#[derive(Debug, Clone, Default)]
pub struct BasicRules {
    config: RulesConfig,
}

impl BasicRules {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }
}

impl Rules for BasicRules {
    fn can_connect(&self, source: &Element, target_type: &str) -> bool {
        source.is_connectable()
            && !self
                .config
                .no_outgoing()
                .iter()
                .any(|kind| kind == source.element_type())
            && !self.config.no_incoming().iter().any(|kind| kind == target_type)
    }
}
