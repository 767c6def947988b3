//! Relational schema inference
//!
//! This module turns documents into an abstract relational schema: typed
//! columns, primary keys, and foreign keys wiring nested tables to their
//! parents.

pub mod builder;
pub mod classifier;
pub mod hints;
pub mod model;

pub use builder::{convert, convert_with_config, SchemaBuilder};
pub use classifier::{classify, resolve, Resolution};
pub use hints::{ColumnHint, HintStore, TableHint};
pub use model::{AbstractType, Column, ForeignKey, Schema, Table};
