use serde::{Deserialize, Serialize};

/// How non-integer JSON numbers enter the document model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FractionalNumbers {
    /// Keep them as binary floating point
    #[default]
    Float,
    /// Read them as exact decimals
    Decimal,
}

/// Configuration for the conversion process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Table name for an unnamed root map or sequence
    pub root_table: String,

    /// Reserved field naming the table a map is stored in
    pub entity_marker: String,

    /// Reserved field naming the primary key column of a new table
    pub identity_field: String,

    /// Fields starting with this prefix are reserved and never become columns
    pub reserved_prefix: String,

    /// Primary key column name when neither the document nor a hint names one
    pub default_id_name: String,

    /// Column holding scalar sequence elements when no hint names one
    pub default_data_name: String,

    /// Position column appended to nested sequence tables
    pub order_column: String,

    /// Suffix for the table holding a sequence nested directly in a sequence
    pub nested_suffix: String,

    /// Suffix appended to the parent table name to form a foreign key column
    pub foreign_key_suffix: String,

    /// Maximum nesting depth (0 = only the root frame)
    pub max_depth: usize,

    /// How non-integer numbers are read when converting from JSON
    pub fractional_numbers: FractionalNumbers,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            root_table: String::from("objects"),
            entity_marker: String::from("__name"),
            identity_field: String::from("__id"),
            reserved_prefix: String::from("__"),
            default_id_name: String::from("id"),
            default_data_name: String::from("data"),
            order_column: String::from("_order"),
            nested_suffix: String::from("_nested"),
            foreign_key_suffix: String::from("_id"),
            max_depth: 32,
            fractional_numbers: FractionalNumbers::Float,
        }
    }
}

impl ConvertConfig {
    #[must_use]
    pub fn with_root_table(mut self, name: impl Into<String>) -> Self {
        self.root_table = name.into();
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn with_fractional_numbers(mut self, mode: FractionalNumbers) -> Self {
        self.fractional_numbers = mode;
        self
    }

    /// Whether `field` is a reserved document field rather than data
    pub fn is_reserved(&self, field: &str) -> bool {
        field == self.entity_marker
            || field == self.identity_field
            || (!self.reserved_prefix.is_empty() && field.starts_with(&self.reserved_prefix))
    }

    /// Foreign key column name pointing at `parent_table`
    pub fn foreign_key_column(&self, parent_table: &str) -> String {
        format!("{}{}", parent_table, self.foreign_key_suffix)
    }

    /// Table name for a sequence nested directly inside `table`
    pub fn nested_table(&self, table: &str) -> String {
        format!("{}{}", table, self.nested_suffix)
    }
}
