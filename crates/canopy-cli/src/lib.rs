//! CLI logic for the Canopy diagram tool.
//!
//! The CLI loads a diagram payload, optionally applies an editing script,
//! optionally writes the edited diagram back out, and reports a summary.

pub mod error;
pub mod script;

mod args;
mod config;

pub use args::Args;
pub use error::CliError;

use std::{fmt, fs};

use log::{debug, info};
use serde::de::DeserializeOwned;

use canopy::{DiagramPayload, Modeler, classify::DiagramType, element::ElementKind};

use script::Script;

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub diagram_type: DiagramType,
    pub shapes: usize,
    pub connections: usize,
    pub labels: usize,
    pub steps: usize,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl Summary {
    fn of(modeler: &Modeler, steps: usize) -> Self {
        let registry = modeler.diagram().canvas().registry();
        let count = |kind: ElementKind| registry.filter(|element| element.kind() == kind).len();
        Self {
            diagram_type: modeler.diagram_type(),
            shapes: count(ElementKind::Shape),
            connections: count(ElementKind::Connection),
            labels: count(ElementKind::Label),
            steps,
            can_undo: modeler.can_undo(),
            can_redo: modeler.can_redo(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "diagram type: {}", self.diagram_type)?;
        writeln!(
            f,
            "elements: {} shapes, {} connections, {} labels",
            self.shapes, self.connections, self.labels
        )?;
        writeln!(f, "steps applied: {}", self.steps)?;
        write!(f, "can undo: {}, can redo: {}", self.can_undo, self.can_redo)
    }
}

/// Run the Canopy CLI application
///
/// This function loads the input diagram, applies the script if one is
/// given, and writes the resulting diagram to the output path if one is
/// given.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `CliError` for:
/// - File I/O errors
/// - Configuration, payload or script parsing errors
/// - Invalid diagrams
/// - Failed script steps
/// - Serialization errors
pub fn run(args: &Args) -> Result<Summary, CliError> {
    info!(input_path = args.input; "Processing diagram");

    let app_config = config::load_config(args.config.as_ref())?;
    let payload: DiagramPayload = read_toml(&args.input, "diagram")?;

    let mut modeler = Modeler::new(app_config).map_err(CliError::Import)?;
    let diagram_type = modeler.import(payload).map_err(CliError::Import)?;
    info!(diagram_type:%; "Diagram loaded");

    let mut steps = 0;
    if let Some(path) = &args.script {
        let script: Script = read_toml(path, "script")?;
        for (index, step) in script.steps.iter().enumerate() {
            debug!(step = index + 1, action = step.action(); "Applying step");
            step.apply(&mut modeler).map_err(|source| CliError::Step {
                step: index + 1,
                action: step.action(),
                source,
            })?;
            steps += 1;
        }
        info!(steps; "Script applied");
    }

    if let Some(path) = &args.output {
        let content = toml::to_string(&modeler.export())
            .map_err(|err| CliError::Export(err.to_string()))?;
        fs::write(path, content).map_err(|err| CliError::io(path.as_str(), err))?;
        info!(output_file = path; "Diagram written");
    }

    Ok(Summary::of(&modeler, steps))
}

/// Reads and parses a TOML file, keeping the source for diagnostics.
pub(crate) fn read_toml<T: DeserializeOwned>(path: &str, what: &'static str) -> Result<T, CliError> {
    let content = fs::read_to_string(path).map_err(|err| CliError::io(path, err))?;
    toml::from_str(&content).map_err(|err| {
        let message = err.message().to_string();
        CliError::toml(what, path, content, &message, err.span())
    })
}
