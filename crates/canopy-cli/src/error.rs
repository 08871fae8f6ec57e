//! Error type of the CLI and its miette diagnostics.
//!
//! Library errors stay plain [`thiserror`] enums. The CLI wraps them in
//! [`CliError`], which adds file context, TOML source snippets and help text
//! for miette's graphical report handler.

use std::{io, ops::Range, path::PathBuf};

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use canopy::ModelingError;

/// Everything that can make a CLI run fail.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to access `{path}`")]
    #[diagnostic(code(canopy::io))]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("missing configuration file `{}`", .0.display())]
    #[diagnostic(
        code(canopy::config),
        help("pass an existing file to --config, or omit the flag to use the defaults")
    )]
    MissingConfig(PathBuf),

    #[error("invalid {what}: {message}")]
    #[diagnostic(code(canopy::toml))]
    Toml {
        what: &'static str,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("failed to load the diagram")]
    #[diagnostic(
        code(canopy::import),
        help("parents, endpoints and label targets must be listed before the elements that use them")
    )]
    Import(#[source] ModelingError),

    #[error("script step {step} (`{action}`) failed")]
    #[diagnostic(
        code(canopy::script),
        help("earlier steps stay applied; the failed step left the diagram unchanged")
    )]
    Step {
        step: usize,
        action: &'static str,
        #[source]
        source: ModelingError,
    },

    #[error("failed to serialize the diagram: {0}")]
    #[diagnostic(code(canopy::export))]
    Export(String),
}

impl CliError {
    pub(crate) fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a TOML parse failure together with the offending source.
    pub(crate) fn toml(
        what: &'static str,
        path: &str,
        content: String,
        message: &str,
        span: Option<Range<usize>>,
    ) -> Self {
        Self::Toml {
            what,
            message: message.trim_end().to_string(),
            src: NamedSource::new(path, content),
            span: span.map(SourceSpan::from),
        }
    }
}
