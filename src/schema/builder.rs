//! Schema builder
//!
//! Walks a document depth-first, turning every map and sequence into a table
//! and every scalar field into a column. Nested structures become child
//! tables carrying a non-null foreign key back to their parent.
//!
//! Each frame validates its own fields and plans every column change before
//! it touches the schema, and [`SchemaBuilder::add_document`] only commits a
//! document once the whole walk has succeeded. A rejected document never
//! leaves a half-updated schema behind.

use super::classifier::{self, Observation, Slot};
use super::hints::HintStore;
use super::model::{AbstractType, Column, Schema, Table};
use crate::config::ConvertConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::borrow::Cow;
use tracing::{debug, info, warn};

/// Accumulates documents into one shared [`Schema`]
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    config: ConvertConfig,
    hints: HintStore,
    schema: Schema,
}

impl SchemaBuilder {
    /// Create a builder with the default configuration and no hints
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ConvertConfig) -> Self {
        SchemaBuilder {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_hints(mut self, hints: HintStore) -> Self {
        self.hints = hints;
        self
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Hints, including primary key names discovered so far
    pub fn hints(&self) -> &HintStore {
        &self.hints
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Convert one root document into the shared schema.
    ///
    /// Returns the name of the root table. On error the schema and hints are
    /// left exactly as they were before the call.
    pub fn add_document(&mut self, document: &Document) -> Result<String> {
        let mut schema = self.schema.clone();
        let mut hints = self.hints.clone();

        let root = Walker {
            config: &self.config,
            schema: &mut schema,
            hints: &mut hints,
        }
        .convert_root(document)?;

        schema.sync_foreign_key_types();
        self.schema = schema;
        self.hints = hints;
        Ok(root)
    }

    /// Convert a JSON value, reading fractional numbers as configured
    pub fn add_json(&mut self, value: Value) -> Result<String> {
        let document = Document::from_json(value, self.config.fractional_numbers);
        self.add_document(&document)
    }

    pub fn add_json_str(&mut self, json: &str) -> Result<String> {
        let value: Value = serde_json::from_str(json)?;
        self.add_json(value)
    }

    /// Finish and hand out the schema
    pub fn build(self) -> Schema {
        self.schema
    }

    pub fn into_parts(self) -> (Schema, HintStore) {
        (self.schema, self.hints)
    }
}

/// Convert a single root document with the default configuration.
///
/// `hints` is read for naming and typing and receives every primary key
/// name chosen during the conversion.
pub fn convert(document: &Document, hints: &mut HintStore) -> Result<Schema> {
    convert_with_config(document, hints, ConvertConfig::default())
}

pub fn convert_with_config(
    document: &Document,
    hints: &mut HintStore,
    config: ConvertConfig,
) -> Result<Schema> {
    let mut builder = SchemaBuilder::with_config(config).with_hints(hints.clone());
    builder.add_document(document)?;

    let (schema, discovered) = builder.into_parts();
    *hints = discovered;
    Ok(schema)
}

/// A value that becomes its own table
enum Child<'d> {
    Map(&'d IndexMap<String, Document>),
    Sequence(&'d [Document]),
}

/// Everything a frame will do, decided before anything is mutated.
/// Map frames key children by field name, sequence frames by position.
struct FramePlan<'d, K> {
    columns: Vec<Column>,
    children: Vec<(K, Child<'d>)>,
    rows: u64,
}

struct Walker<'a> {
    config: &'a ConvertConfig,
    schema: &'a mut Schema,
    hints: &'a mut HintStore,
}

impl Walker<'_> {
    fn convert_root(&mut self, document: &Document) -> Result<String> {
        match document {
            Document::Map(map) => self.convert_map(map, None, 0),
            Document::Sequence(items) => self.convert_sequence(items, None, 0),
            other => Err(Error::UnsupportedRoot { kind: other.kind() }),
        }
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(Error::DepthExceeded {
                depth,
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    /// Text value of a reserved field, if the map carries it
    fn reserved_text<'d>(
        &self,
        map: &'d IndexMap<String, Document>,
        field: &str,
    ) -> Result<Option<&'d str>> {
        match map.get(field) {
            None => Ok(None),
            Some(Document::Text(text)) => Ok(Some(text)),
            Some(other) => Err(Error::InvalidReservedField {
                field: field.to_string(),
                kind: other.kind(),
            }),
        }
    }

    /// Primary key for a table about to be created: the document's identity
    /// override, then a hint, then the default
    fn primary_key_name(&self, table: &str, identity: Option<&str>) -> String {
        identity
            .or_else(|| self.hints.id_name(table))
            .unwrap_or(&self.config.default_id_name)
            .to_string()
    }

    /// Apply planned columns to `name`, registering the table first when the
    /// frame created it
    fn commit(&mut self, name: &str, fresh: Option<Table>, columns: Vec<Column>, rows: u64) {
        if let Some(table) = fresh {
            info!(table = name, primary_key = table.primary_key(), "creating table");
            self.hints.set_id_name(name, table.primary_key());
            self.schema.insert_table(table);
        }

        self.schema.put_columns(name, columns);
        self.schema.add_rows(name, rows);
    }

    /// Next state of a scalar column. Columns that first show up once the
    /// table already holds rows are nullable, since those rows lack them.
    fn plan_column(
        &self,
        table: &Table,
        column: &str,
        current: Option<&Column>,
        rows_before: u64,
        obs: Observation,
    ) -> Result<Column> {
        let slot = Slot {
            table: table.name(),
            column,
            primary_key: table.is_primary_key(column),
        };
        let mut next = classifier::merge(slot, current, obs)?;

        if current.is_none() && rows_before > 0 && !slot.primary_key {
            debug!(table = table.name(), column, "column added after rows, marking nullable");
            next.nullable = true;
        }
        Ok(next)
    }

    fn convert_map(
        &mut self,
        map: &IndexMap<String, Document>,
        default_name: Option<&str>,
        depth: usize,
    ) -> Result<String> {
        self.check_depth(depth)?;

        let table_name = self
            .reserved_text(map, &self.config.entity_marker)?
            .or(default_name)
            .unwrap_or(&self.config.root_table)
            .to_string();
        let identity = self.reserved_text(map, &self.config.identity_field)?;

        let table = match self.schema.table(&table_name) {
            Some(existing) => {
                if let Some(identity) = identity.filter(|id| !existing.is_primary_key(id)) {
                    warn!(
                        table = %table_name,
                        primary_key = existing.primary_key(),
                        ignored = identity,
                        "table already exists, ignoring identity override"
                    );
                }
                Cow::Borrowed(existing)
            }
            None => Cow::Owned(Table::new(
                table_name.clone(),
                self.primary_key_name(&table_name, identity),
            )),
        };

        let plan = self.plan_map(&table, map)?;
        let fresh = match table {
            Cow::Owned(table) => Some(table),
            Cow::Borrowed(_) => None,
        };
        self.commit(&table_name, fresh, plan.columns, plan.rows);

        for (field, child) in plan.children {
            let child_table = match child {
                Child::Map(child) => self.convert_map(child, Some(field), depth + 1)?,
                Child::Sequence(items) => self.convert_sequence(items, Some(field), depth + 1)?,
            };
            self.link(&child_table, &table_name)?;
        }

        Ok(table_name)
    }

    fn plan_map<'d>(
        &self,
        table: &Table,
        map: &'d IndexMap<String, Document>,
    ) -> Result<FramePlan<'d, &'d str>> {
        let mut plan = FramePlan {
            columns: Vec::new(),
            children: Vec::new(),
            rows: 1,
        };

        for (field, value) in map {
            if self.config.is_reserved(field) {
                continue;
            }

            match value {
                Document::Map(child) => {
                    plan.children.push((field.as_str(), Child::Map(child)));
                }
                Document::Sequence(items) => {
                    plan.children.push((field.as_str(), Child::Sequence(items.as_slice())));
                }
                Document::Bytes(_) => {
                    return Err(Error::UnsupportedField {
                        table: table.name().to_string(),
                        field: field.clone(),
                        kind: value.kind(),
                    });
                }
                scalar => {
                    let hint = self.hints.column_type(table.name(), field);
                    let Some(obs) = classifier::observe(scalar, hint) else {
                        return Err(Error::UnsupportedField {
                            table: table.name().to_string(),
                            field: field.clone(),
                            kind: scalar.kind(),
                        });
                    };
                    let column =
                        self.plan_column(table, field, table.column(field), table.row_count(), obs)?;
                    plan.columns.push(column);
                }
            }
        }

        Ok(plan)
    }

    fn convert_sequence(
        &mut self,
        items: &[Document],
        name: Option<&str>,
        depth: usize,
    ) -> Result<String> {
        self.check_depth(depth)?;

        let table_name = name.unwrap_or(&self.config.root_table).to_string();
        let data_name = self
            .hints
            .data_name(&table_name)
            .unwrap_or(&self.config.default_data_name)
            .to_string();

        let table = match self.schema.table(&table_name) {
            Some(existing) => Cow::Borrowed(existing),
            None => {
                let mut table =
                    Table::new(table_name.clone(), self.primary_key_name(&table_name, None));
                // Nested sequences are ordered and must keep that order once stored
                if name.is_some() {
                    table.put_column(Column::new(
                        self.config.order_column.clone(),
                        AbstractType::Integer,
                        false,
                    ));
                }
                Cow::Owned(table)
            }
        };

        let plan = self.plan_sequence(&table, &data_name, items)?;
        let fresh = match table {
            Cow::Owned(table) => Some(table),
            Cow::Borrowed(_) => None,
        };
        self.commit(&table_name, fresh, plan.columns, plan.rows);

        for (_, child) in plan.children {
            match child {
                // Sibling maps coalesce into the sequence's own table
                Child::Map(element) => {
                    self.convert_map(element, Some(&table_name), depth + 1)?;
                }
                Child::Sequence(inner) => {
                    let nest_name = self.config.nested_table(&table_name);
                    let nested = self.convert_sequence(inner, Some(&nest_name), depth + 1)?;
                    self.link(&nested, &table_name)?;
                }
            }
        }

        Ok(table_name)
    }

    /// Every element is examined, so later elements can still widen types
    /// or introduce nulls
    fn plan_sequence<'d>(
        &self,
        table: &Table,
        data_name: &str,
        items: &'d [Document],
    ) -> Result<FramePlan<'d, usize>> {
        let mut children = Vec::new();
        let mut data_column: Option<Column> = None;
        let mut rows = 0;
        // Rows of map elements that land in this table. Their own frames
        // record them, but a data column planned after them must still see them.
        let mut element_rows = 0;
        let hint = self.hints.column_type(table.name(), data_name);

        for (index, item) in items.iter().enumerate() {
            match item {
                Document::Map(element) => {
                    let marker = self.reserved_text(element, &self.config.entity_marker)?;
                    if marker.map_or(true, |name| name == table.name()) {
                        element_rows += 1;
                    }
                    children.push((index, Child::Map(element)));
                }
                Document::Sequence(inner) => {
                    children.push((index, Child::Sequence(inner.as_slice())));
                    rows += 1;
                }
                Document::Bytes(_) => {
                    return Err(Error::UnsupportedElement {
                        table: table.name().to_string(),
                        index,
                        kind: item.kind(),
                    });
                }
                scalar => {
                    let Some(obs) = classifier::observe(scalar, hint) else {
                        return Err(Error::UnsupportedElement {
                            table: table.name().to_string(),
                            index,
                            kind: scalar.kind(),
                        });
                    };
                    let rows_before = table.row_count() + rows + element_rows;
                    let pending = data_column.take();
                    let current = pending.as_ref().or_else(|| table.column(data_name));
                    data_column = Some(self.plan_column(table, data_name, current, rows_before, obs)?);
                    rows += 1;
                }
            }
        }

        // Map rows never carry the data column
        if let Some(column) = data_column.as_mut() {
            if element_rows > 0 && !table.has_column(data_name) && !column.nullable {
                debug!(
                    table = table.name(),
                    column = data_name,
                    "data column shares rows with maps"
                );
                column.nullable = true;
            }
        }

        Ok(FramePlan {
            columns: data_column.into_iter().collect(),
            children,
            rows,
        })
    }

    /// Point `child` back at `parent` through a `{parent}_id` column
    fn link(&mut self, child: &str, parent: &str) -> Result<()> {
        let column = self.config.foreign_key_column(parent);
        self.schema.link(child, &column, parent)
    }
}
