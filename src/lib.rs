//! # Tablecast - Relational Schemas from Nested Documents
//!
//! Infers a normalized relational schema from arbitrary nested documents
//! (maps, sequences, and scalars). Every map and sequence becomes a table,
//! every scalar field a typed column, and nested structures are wired to
//! their parents with foreign keys.
//!
//! The output is an abstract [`Schema`]; rendering it to engine-specific DDL
//! is left to the caller.
//!
//! ## Modules
//!
//! - **document**: the universal document model and its JSON conversion
//! - **schema**: the schema model, type classifier, hints, and builder
//! - **config**: reserved field names, defaults, and limits
//!
//! ## Quick Start
//!
//! ```rust
//! use tablecast::{convert, AbstractType, Document, HintStore};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = json!({
//!     "__name": "users",
//!     "name": "Alice",
//!     "tags": ["admin", "ops"],
//!     "address": {"city": "Lisbon"}
//! });
//!
//! let mut hints = HintStore::new();
//! let schema = convert(&Document::from(data), &mut hints)?;
//!
//! // users(id, name), tags(id, _order, data, users_id), address(id, city, users_id)
//! assert_eq!(schema.table_names(), vec!["users", "tags", "address"]);
//! let tags = schema.table("tags").unwrap();
//! assert_eq!(tags.column("data").unwrap().column_type, AbstractType::Text);
//! # Ok(())
//! # }
//! ```
//!
//! ### Many documents, one schema
//!
//! ```rust
//! use tablecast::SchemaBuilder;
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = SchemaBuilder::new();
//! builder.add_json(json!({"__name": "events", "kind": "click"}))?;
//! builder.add_json(json!({"__name": "events", "kind": "view", "x": 10}))?;
//!
//! let schema = builder.build();
//! assert_eq!(schema.table("events").unwrap().column_names(), vec!["id", "kind", "x"]);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::BufRead;
use tracing::warn;

pub mod config;
pub mod document;
pub mod error;
pub mod schema;

// Re-export commonly used types for convenience
pub use config::{ConvertConfig, FractionalNumbers};
pub use document::Document;
pub use error::Error;
pub use schema::{
    convert, convert_with_config, AbstractType, Column, ForeignKey, HintStore, Schema,
    SchemaBuilder, Table,
};

/// What to do with a document the schema cannot absorb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first rejected document
    #[default]
    Abort,
    /// Log the rejection and move on to the next document
    Skip,
}

/// A document left out of the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedDocument {
    /// 1-based line number in the input
    pub line: usize,
    pub reason: String,
}

/// Outcome of feeding a stream of documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub accepted: usize,
    pub rejected: Vec<RejectedDocument>,
}

/// Feed a newline-delimited JSON stream into `builder`.
///
/// Every document is integrated as a unit: it either lands in the schema
/// completely or not at all. Malformed JSON always stops the stream;
/// documents that conflict with the schema are handled per `policy`.
pub fn infer_json_stream<R: BufRead>(
    reader: R,
    builder: &mut SchemaBuilder,
    policy: BatchPolicy,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.context("Failed to read line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse JSON on line {}", line_number))?;

        match builder.add_json(value) {
            Ok(_) => report.accepted += 1,
            Err(e) => match policy {
                BatchPolicy::Abort => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Document on line {} rejected", line_number)));
                }
                BatchPolicy::Skip => {
                    warn!(line = line_number, error = %e, "skipping document");
                    report.rejected.push(RejectedDocument {
                        line: line_number,
                        reason: e.to_string(),
                    });
                }
            },
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const STREAM: &str = r#"{"__name": "users", "age": 30}

{"__name": "users", "age": "thirty"}
{"__name": "users", "age": 31, "name": "Bob"}
"#;

    #[test]
    fn test_stream_skips_conflicts() {
        let mut builder = SchemaBuilder::new();
        let report = infer_json_stream(Cursor::new(STREAM), &mut builder, BatchPolicy::Skip).unwrap();

        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 3);
        assert!(report.rejected[0].reason.contains("users.age"));

        let users = builder.schema().table("users").unwrap();
        assert_eq!(users.column_names(), vec!["id", "age", "name"]);
        assert_eq!(users.column("age").unwrap().column_type, AbstractType::Integer);
    }

    #[test]
    fn test_stream_aborts_on_conflict() {
        let mut builder = SchemaBuilder::new();
        let err = infer_json_stream(Cursor::new(STREAM), &mut builder, BatchPolicy::Abort)
            .unwrap_err();

        assert!(err.to_string().contains("line 3"));
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ColumnConflict { .. })
        ));
        // The first document stays integrated
        assert!(builder.schema().table("users").is_some());
    }

    #[test]
    fn test_stream_malformed_json_is_fatal() {
        let mut builder = SchemaBuilder::new();
        let result = infer_json_stream(
            Cursor::new("{\"a\": 1}\n{not json}\n"),
            &mut builder,
            BatchPolicy::Skip,
        );

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("line 2"));
    }
}
