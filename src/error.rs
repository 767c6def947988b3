//! Error types for schema conversion
//!
//! Every conversion error is terminal for the document being converted.
//! Nothing is retried internally; callers decide whether to hint-correct and
//! resubmit, skip the document, or abort the batch.

use crate::schema::AbstractType;
use thiserror::Error;

/// The main error type for tablecast
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Shape Errors
    // ============================================================================
    #[error("root value must be a map or a sequence, found {kind}")]
    UnsupportedRoot { kind: &'static str },

    #[error("field '{field}' of table '{table}' holds an unsupported value ({kind})")]
    UnsupportedField {
        table: String,
        field: String,
        kind: &'static str,
    },

    #[error("element {index} of table '{table}' is an unsupported value ({kind})")]
    UnsupportedElement {
        table: String,
        index: usize,
        kind: &'static str,
    },

    #[error("reserved field '{field}' must hold text, found {kind}")]
    InvalidReservedField { field: String, kind: &'static str },

    #[error("nesting depth {depth} exceeds the limit of {limit}")]
    DepthExceeded { depth: usize, limit: usize },

    // ============================================================================
    // Schema Errors
    // ============================================================================
    #[error("column '{table}.{column}' is {existing}, cannot store {observed}")]
    ColumnConflict {
        table: String,
        column: String,
        existing: AbstractType,
        observed: AbstractType,
    },

    #[error("column '{table}.{column}' already exists and is not a foreign key")]
    ForeignKeyConflict { table: String, column: String },

    #[error("tables reference each other in a cycle: {}", tables.join(", "))]
    CyclicReferences { tables: Vec<String> },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("invalid hint: {0}")]
    InvalidHint(String),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error comes from the shape of the input rather than from
    /// a disagreement with what the schema already holds
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedRoot { .. }
                | Error::UnsupportedField { .. }
                | Error::UnsupportedElement { .. }
                | Error::InvalidReservedField { .. }
                | Error::DepthExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_both_types() {
        let err = Error::ColumnConflict {
            table: "users".to_string(),
            column: "age".to_string(),
            existing: AbstractType::Integer,
            observed: AbstractType::Text,
        };

        assert_eq!(err.to_string(), "column 'users.age' is integer, cannot store text");
        assert!(!err.is_shape_error());
    }

    #[test]
    fn test_cycle_message() {
        let err = Error::CyclicReferences {
            tables: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "tables reference each other in a cycle: a, b");
    }

    #[test]
    fn test_shape_errors() {
        assert!(Error::UnsupportedRoot { kind: "text" }.is_shape_error());
        assert!(Error::DepthExceeded { depth: 5, limit: 4 }.is_shape_error());
    }
}
