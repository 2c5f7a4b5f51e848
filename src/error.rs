use crate::types::{CellAddress, SheetId};
use thiserror::Error;

pub type CellGraphResult<T> = Result<T, CellGraphError>;

#[derive(Error, Debug)]
pub enum CellGraphError {
    #[error("Formula parse error: {0}")]
    Parse(String),

    #[error("Unresolved sheet '{sheet}' in reference '{reference}'")]
    UnresolvedSheet { sheet: String, reference: String },

    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),

    /// Raised by the mark phase only; a pass converts it into sentinel writes.
    #[error("Circular reference detected at {0}")]
    CircularReference(CellAddress),

    #[error("Unknown worksheet: {0}")]
    UnknownWorksheet(String),

    #[error("Unknown sheet handle: {0}")]
    UnknownSheet(SheetId),

    #[error("Worksheet already exists: {0}")]
    DuplicateWorksheet(String),

    #[error("Invalid worksheet name: '{0}'")]
    InvalidWorksheetName(String),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl CellGraphError {
    /// True for failures that stop a formula from being installed.
    pub fn is_formula_rejection(&self) -> bool {
        matches!(
            self,
            CellGraphError::Parse(_)
                | CellGraphError::UnresolvedSheet { .. }
                | CellGraphError::InvalidReference(_)
        )
    }
}
