//! Abstract relational schema produced by conversion
//!
//! A [`Schema`] is an insertion-ordered set of [`Table`]s. Tables and columns
//! are only ever added or widened, never removed, so a renderer can walk the
//! schema at any point and get a consistent picture.

use crate::error::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-independent column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbstractType {
    Null,
    Boolean,
    Integer,
    Float,
    Decimal,
    Text,
    /// Binary placeholder for a column that has only ever seen nulls
    Opaque,
}

impl AbstractType {
    pub fn as_str(self) -> &'static str {
        match self {
            AbstractType::Null => "null",
            AbstractType::Boolean => "boolean",
            AbstractType::Integer => "integer",
            AbstractType::Float => "float",
            AbstractType::Decimal => "decimal",
            AbstractType::Text => "text",
            AbstractType::Opaque => "opaque",
        }
    }
}

impl AbstractType {
    /// Whether a column type hint may name this type. `Null` and `Opaque`
    /// only describe columns that have not seen a value yet.
    pub fn is_hintable(self) -> bool {
        !matches!(self, AbstractType::Null | AbstractType::Opaque)
    }
}

impl fmt::Display for AbstractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: AbstractType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: AbstractType, nullable: bool) -> Self {
        Column {
            name: name.into(),
            column_type,
            nullable,
        }
    }
}

/// `column` on the owning table references `referenced_table.referenced_column`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// One table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    primary_key: String,
    columns: IndexMap<String, Column>,
    foreign_keys: IndexSet<ForeignKey>,
    #[serde(skip)]
    rows: u64,
}

impl Table {
    /// Create a table holding only its primary key column (`Integer`, not null)
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        let mut columns = IndexMap::new();
        columns.insert(
            primary_key.clone(),
            Column::new(primary_key.clone(), AbstractType::Integer, false),
        );

        Table {
            name: name.into(),
            primary_key,
            columns,
            foreign_keys: IndexSet::new(),
            rows: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the primary key column, fixed at creation
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// `None` only for a deserialized table that lacks its key column
    pub fn primary_key_column(&self) -> Option<&Column> {
        self.columns.get(&self.primary_key)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key == column
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Columns in insertion order
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    /// Number of rows the converted documents contributed so far
    pub fn row_count(&self) -> u64 {
        self.rows
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys.iter()
    }

    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    /// Append a column, or overwrite the stored state of an existing one.
    ///
    /// Callers are expected to have resolved compatibility already; the
    /// primary key keeps its name and stays non-nullable.
    pub(crate) fn put_column(&mut self, mut column: Column) {
        if self.is_primary_key(&column.name) {
            column.nullable = false;
        }
        self.columns.insert(column.name.clone(), column);
    }

    /// Add `column` referencing `referenced_table.referenced_column`.
    ///
    /// Re-adding an identical link is a no-op. A plain data column that
    /// already occupies the name is a conflict.
    pub(crate) fn link(
        &mut self,
        column: &str,
        column_type: AbstractType,
        referenced_table: &str,
        referenced_column: &str,
    ) -> Result<()> {
        let fk = ForeignKey {
            column: column.to_string(),
            referenced_table: referenced_table.to_string(),
            referenced_column: referenced_column.to_string(),
        };

        if self.foreign_keys.contains(&fk) {
            return Ok(());
        }

        if self.columns.contains_key(column) {
            return Err(Error::ForeignKeyConflict {
                table: self.name.clone(),
                column: column.to_string(),
            });
        }

        self.columns
            .insert(column.to_string(), Column::new(column, column_type, false));
        self.foreign_keys.insert(fk);
        Ok(())
    }

    pub(crate) fn set_column_type(&mut self, column: &str, column_type: AbstractType) -> bool {
        match self.columns.get_mut(column) {
            Some(existing) if existing.column_type != column_type => {
                existing.column_type = column_type;
                true
            }
            _ => false,
        }
    }
}

/// Insertion-ordered mapping from table name to [`Table`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    tables: IndexMap<String, Table>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Tables in creation order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Register a table. An existing table of the same name is kept as is.
    pub(crate) fn insert_table(&mut self, table: Table) {
        self.tables.entry(table.name.clone()).or_insert(table);
    }

    pub(crate) fn put_columns(&mut self, table: &str, columns: Vec<Column>) {
        if let Some(table) = self.tables.get_mut(table) {
            for column in columns {
                table.put_column(column);
            }
        }
    }

    pub(crate) fn add_rows(&mut self, table: &str, rows: u64) {
        if let Some(table) = self.tables.get_mut(table) {
            table.rows += rows;
        }
    }

    /// Give `child` a non-null `column` referencing the primary key of `parent`
    pub(crate) fn link(&mut self, child: &str, column: &str, parent: &str) -> Result<()> {
        let Some((referenced_column, column_type)) = self
            .tables
            .get(parent)
            .and_then(|t| Some((t.primary_key.clone(), t.primary_key_column()?.column_type)))
        else {
            return Ok(());
        };

        match self.tables.get_mut(child) {
            Some(table) => table.link(column, column_type, parent, &referenced_column),
            None => Ok(()),
        }
    }

    /// Give every foreign key column the current type of the primary key it
    /// references. Repeats until stable since a primary key may itself be a
    /// foreign key column.
    pub(crate) fn sync_foreign_key_types(&mut self) {
        for _ in 0..=self.tables.len() {
            let mut updates = Vec::new();
            for table in self.tables.values() {
                for fk in &table.foreign_keys {
                    let target = self
                        .tables
                        .get(&fk.referenced_table)
                        .and_then(|t| t.column(&fk.referenced_column));
                    if let Some(target) = target {
                        updates.push((table.name.clone(), fk.column.clone(), target.column_type));
                    }
                }
            }

            let mut changed = false;
            for (table, column, column_type) in updates {
                if let Some(table) = self.tables.get_mut(&table) {
                    changed |= table.set_column_type(&column, column_type);
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Tables ordered so that each one follows every table it references.
    ///
    /// Self-references are ignored. Ties keep creation order.
    pub fn dependency_order(&self) -> Result<Vec<&Table>> {
        let mut remaining: IndexMap<&str, IndexSet<&str>> = self
            .tables
            .values()
            .map(|table| {
                let deps = table
                    .foreign_keys
                    .iter()
                    .map(|fk| fk.referenced_table.as_str())
                    .filter(|dep| *dep != table.name && self.tables.contains_key(*dep))
                    .collect();
                (table.name.as_str(), deps)
            })
            .collect();

        let mut ordered = Vec::with_capacity(self.tables.len());
        while !remaining.is_empty() {
            let ready = remaining
                .iter()
                .find(|(_, deps)| deps.is_empty())
                .map(|(name, _)| *name);

            let Some(name) = ready else {
                return Err(Error::CyclicReferences {
                    tables: remaining.keys().map(|t| t.to_string()).collect(),
                });
            };

            remaining.shift_remove(name);
            for deps in remaining.values_mut() {
                deps.shift_remove(name);
            }
            ordered.push(&self.tables[name]);
        }

        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_table_has_primary_key() {
        let table = Table::new("users", "user_id");

        assert_eq!(table.primary_key(), "user_id");
        assert_eq!(table.column_names(), vec!["user_id"]);
        assert_eq!(
            table.primary_key_column(),
            Some(&Column::new("user_id", AbstractType::Integer, false))
        );
    }

    #[test]
    fn test_primary_key_never_nullable() {
        let mut table = Table::new("users", "id");
        table.put_column(Column::new("id", AbstractType::Text, true));

        let pk = table.primary_key_column().unwrap();
        assert_eq!(pk.column_type, AbstractType::Text);
        assert!(!pk.nullable);
    }

    #[test]
    fn test_link_is_idempotent() {
        let mut table = Table::new("posts", "id");
        table.link("users_id", AbstractType::Integer, "users", "id").unwrap();
        table.link("users_id", AbstractType::Integer, "users", "id").unwrap();

        assert_eq!(table.column_names(), vec!["id", "users_id"]);
        assert_eq!(table.foreign_keys().count(), 1);
    }

    #[test]
    fn test_link_over_data_column_conflicts() {
        let mut table = Table::new("posts", "id");
        table.put_column(Column::new("users_id", AbstractType::Text, false));

        let err = table
            .link("users_id", AbstractType::Integer, "users", "id")
            .unwrap_err();
        assert!(matches!(err, Error::ForeignKeyConflict { .. }));
    }

    #[test]
    fn test_dependency_order_puts_parents_first() {
        let mut schema = Schema::new();
        let mut child = Table::new("posts", "id");
        child.link("users_id", AbstractType::Integer, "users", "id").unwrap();
        schema.insert_table(child);
        schema.insert_table(Table::new("users", "id"));
        schema.insert_table(Table::new("tags", "id"));

        let names: Vec<&str> = schema
            .dependency_order()
            .unwrap()
            .into_iter()
            .map(Table::name)
            .collect();
        assert_eq!(names, vec!["users", "posts", "tags"]);
    }

    #[test]
    fn test_dependency_order_ignores_self_reference() {
        let mut schema = Schema::new();
        let mut tree = Table::new("node", "id");
        tree.link("node_id", AbstractType::Integer, "node", "id").unwrap();
        schema.insert_table(tree);

        assert_eq!(schema.dependency_order().unwrap().len(), 1);
    }

    #[test]
    fn test_dependency_order_detects_cycle() {
        let mut schema = Schema::new();
        let mut a = Table::new("a", "id");
        a.link("b_id", AbstractType::Integer, "b", "id").unwrap();
        let mut b = Table::new("b", "id");
        b.link("a_id", AbstractType::Integer, "a", "id").unwrap();
        schema.insert_table(a);
        schema.insert_table(b);

        match schema.dependency_order() {
            Err(Error::CyclicReferences { tables }) => assert_eq!(tables, vec!["a", "b"]),
            other => panic!("Expected cycle error, got: {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn test_sync_foreign_key_types_follows_primary_key() {
        let mut schema = Schema::new();
        schema.insert_table(Table::new("users", "id"));
        let mut posts = Table::new("posts", "id");
        posts.link("users_id", AbstractType::Integer, "users", "id").unwrap();
        schema.insert_table(posts);

        schema
            .table_mut("users")
            .unwrap()
            .put_column(Column::new("id", AbstractType::Text, false));
        schema.sync_foreign_key_types();

        let fk_column = schema.table("posts").unwrap().column("users_id").unwrap();
        assert_eq!(fk_column.column_type, AbstractType::Text);
    }

    #[test]
    fn test_serialized_shape() {
        let mut schema = Schema::new();
        schema.insert_table(Table::new("users", "id"));

        schema.add_rows("users", 3);

        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["users"]["primary_key"], "id");
        assert_eq!(value["users"]["columns"]["id"]["type"], "integer");
        assert!(value["users"].get("rows").is_none());
    }

    #[test]
    fn test_deserialized_table_without_key_column() {
        let table: Table = serde_json::from_value(serde_json::json!({
            "name": "users",
            "primary_key": "id",
            "columns": {},
            "foreign_keys": []
        }))
        .unwrap();

        assert_eq!(table.primary_key_column(), None);
        assert_eq!(table.row_count(), 0);

        let mut schema = Schema::new();
        schema.insert_table(table);
        schema.insert_table(Table::new("posts", "id"));
        schema.link("posts", "users_id", "users").unwrap();
        assert!(!schema.table("posts").unwrap().has_column("users_id"));
    }
}
