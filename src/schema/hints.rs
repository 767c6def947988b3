//! Caller-supplied hints
//!
//! Hints come in two flavours and share one JSON object:
//!
//! ```json
//! {
//!     "card": { "id_name": "card_id" },
//!     "games": { "data_name": "game" },
//!     "card.cmc": { "type": "decimal" }
//! }
//! ```
//!
//! Table hints name the primary key and the scalar column of a sequence
//! table. Column hints (`"table.column"`) pin a column's type. The builder
//! writes discovered primary key names back into the store so that every
//! later frame agrees on them.

use super::model::AbstractType;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Naming hints for one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_name: Option<String>,
}

/// Type override for one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnHint {
    #[serde(rename = "type")]
    pub column_type: AbstractType,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawHint {
    Column(ColumnHint),
    Table(TableHint),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "IndexMap<String, serde_json::Value>",
    into = "IndexMap<String, serde_json::Value>"
)]
pub struct HintStore {
    tables: IndexMap<String, TableHint>,
    columns: IndexMap<String, ColumnHint>,
}

impl HintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    #[must_use]
    pub fn with_id_name(mut self, table: &str, id_name: impl Into<String>) -> Self {
        self.set_id_name(table, id_name);
        self
    }

    #[must_use]
    pub fn with_data_name(mut self, table: &str, data_name: impl Into<String>) -> Self {
        self.tables.entry(table.to_string()).or_default().data_name = Some(data_name.into());
        self
    }

    #[must_use]
    pub fn with_column_type(mut self, table: &str, column: &str, column_type: AbstractType) -> Self {
        self.columns
            .insert(column_key(table, column), ColumnHint { column_type });
        self
    }

    pub fn table(&self, table: &str) -> Option<&TableHint> {
        self.tables.get(table)
    }

    pub fn id_name(&self, table: &str) -> Option<&str> {
        self.tables.get(table)?.id_name.as_deref()
    }

    pub fn data_name(&self, table: &str) -> Option<&str> {
        self.tables.get(table)?.data_name.as_deref()
    }

    pub fn column_type(&self, table: &str, column: &str) -> Option<AbstractType> {
        self.columns
            .get(&column_key(table, column))
            .map(|hint| hint.column_type)
    }

    /// Record the primary key name chosen for `table`
    pub fn set_id_name(&mut self, table: &str, id_name: impl Into<String>) {
        self.tables.entry(table.to_string()).or_default().id_name = Some(id_name.into());
    }
}

fn column_key(table: &str, column: &str) -> String {
    format!("{}.{}", table, column)
}

impl TryFrom<IndexMap<String, serde_json::Value>> for HintStore {
    type Error = Error;

    fn try_from(raw: IndexMap<String, serde_json::Value>) -> Result<Self> {
        let mut store = HintStore::new();

        for (key, value) in raw {
            let hint: RawHint = serde_json::from_value(value)
                .map_err(|e| Error::InvalidHint(format!("'{}': {}", key, e)))?;

            match hint {
                RawHint::Column(column) => {
                    if !key.contains('.') {
                        return Err(Error::InvalidHint(format!(
                            "'{}': type hints are keyed by 'table.column'",
                            key
                        )));
                    }
                    if !column.column_type.is_hintable() {
                        return Err(Error::InvalidHint(format!(
                            "'{}': a column cannot be pinned to {}",
                            key, column.column_type
                        )));
                    }
                    store.columns.insert(key, column);
                }
                RawHint::Table(table) => {
                    store.tables.insert(key, table);
                }
            }
        }

        Ok(store)
    }
}

impl From<HintStore> for IndexMap<String, serde_json::Value> {
    fn from(store: HintStore) -> Self {
        let mut raw = IndexMap::new();
        for (key, hint) in store.tables {
            raw.insert(key, serde_json::to_value(hint).unwrap_or_default());
        }
        for (key, hint) in store.columns {
            raw.insert(key, serde_json::to_value(hint).unwrap_or_default());
        }
        raw
    }
}
