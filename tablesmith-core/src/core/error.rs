//! Error types for the Tablesmith core library.

use crate::core::formula::FormulaError;
use thiserror::Error;

/// All errors that can occur within the Tablesmith core library.
#[derive(Debug, Error)]
pub enum TablesmithError {
    /// A formula string could not be parsed.
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    /// A table's rows do not match its header count, or an edit addressed a
    /// row or column that does not exist.
    #[error("Invalid table structure: {0}")]
    InvalidTableStructure(String),

    /// A formula referenced a column that is not among the table headers.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// The calculation engine has no strategy registered for a function.
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),

    /// The document store has no document at the requested path.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// An operation needed the active document but none is open.
    #[error("No active document")]
    NoActiveDocument,

    /// The document changed since its tables were parsed.
    #[error("Document changed since it was parsed: {0}")]
    StaleDocument(String),

    /// No table in the document carries the requested anchor.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// No saved calculation exists at the requested anchor and index.
    #[error("Calculation not found: {0}")]
    CalculationNotFound(String),

    /// An anchor prefix would produce anchor lines that do not parse back.
    #[error("Invalid anchor prefix: '{0}'")]
    InvalidAnchorPrefix(String),

    /// A calculation output target could not be interpreted.
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frontmatter value could not be encoded as YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias that pins the error type to [`TablesmithError`].
pub type Result<T> = std::result::Result<T, TablesmithError>;

impl TablesmithError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Formula(e) => format!("Formula error: {e}"),
            Self::InvalidTableStructure(msg) => format!("Table is malformed: {msg}"),
            Self::ColumnNotFound(name) => format!("No column named '{name}'"),
            Self::UnsupportedFunction(name) => format!("Function '{name}' is not available"),
            Self::DocumentNotFound(path) => format!("Could not find {path}"),
            Self::NoActiveDocument => "Open a document first".to_string(),
            Self::StaleDocument(_) => {
                "The document changed while editing; reload the table and try again".to_string()
            }
            Self::TableNotFound(_) => "Table no longer exists".to_string(),
            Self::CalculationNotFound(_) => "Calculation no longer exists".to_string(),
            Self::InvalidAnchorPrefix(prefix) => format!(
                "'{prefix}' cannot start an anchor; use letters, digits and '-'"
            ),
            Self::InvalidOutput(msg) => msg.clone(),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Settings format error: {e}"),
            Self::Yaml(e) => format!("Frontmatter format error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_error_converts() {
        let e: TablesmithError = FormulaError::UnknownFunction("Foo".to_string()).into();
        assert!(matches!(e, TablesmithError::Formula(FormulaError::UnknownFunction(_))));
        assert!(e.to_string().contains("Foo"));
    }

    #[test]
    fn test_user_message_names_missing_column() {
        let e = TablesmithError::ColumnNotFound("Price".to_string());
        assert_eq!(e.user_message(), "No column named 'Price'");
    }
}
