//! Error handling module for stepcvt
//!
//! Each layer has its own error enum; [`StepcvtError`] wraps the ones that
//! surface through project operations so callers can use a single `Result`.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::{CatalogError, ValidationError};
use crate::choices::ChoiceSpecError;
use crate::expr::ParseError;

/// Main error type for stepcvt
#[derive(Error, Debug)]
pub enum StepcvtError {
    /// Expression text rejected by the grammar
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Choice declarations are inconsistent
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Submitted answers rejected
    #[error("Invalid answers: {0}")]
    Validation(#[from] ValidationError),

    /// Textual choice or value definition rejected
    #[error("Invalid choice: {0}")]
    ChoiceSpec(#[from] ChoiceSpecError),

    #[error("No choice named '{varname}'")]
    UnknownChoice { varname: String },

    #[error("No source named '{name}'")]
    UnknownSource { name: String },

    #[error("A source named '{name}' already exists")]
    DuplicateSource { name: String },

    #[error("Project has no sources")]
    NoSources,

    #[error("Source '{source_name}' has no part '{part_id}'")]
    UnknownPart { source_name: String, part_id: String },

    /// Source path cannot be stored relative to the project directory
    #[error("Source path {path:?} is not under project directory {root:?}")]
    PathOutsideRoot { path: PathBuf, root: PathBuf },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for stepcvt operations
pub type Result<T> = std::result::Result<T, StepcvtError>;

impl StepcvtError {
    /// Create an unknown choice error
    pub fn unknown_choice(varname: impl Into<String>) -> Self {
        Self::UnknownChoice {
            varname: varname.into(),
        }
    }

    /// Create an unknown source error
    pub fn unknown_source(name: impl Into<String>) -> Self {
        Self::UnknownSource { name: name.into() }
    }

    /// Create an unknown part error
    pub fn unknown_part(source_name: impl Into<String>, part_id: impl Into<String>) -> Self {
        Self::UnknownPart {
            source_name: source_name.into(),
            part_id: part_id.into(),
        }
    }

    /// Create a path error
    pub fn path_outside_root(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self::PathOutsideRoot {
            path: path.into(),
            root: root.into(),
        }
    }
}
