//! Universal document model
//!
//! A [`Document`] is a map, a sequence, or a scalar. Maps keep their key
//! order so that columns are created in the order fields appear.

use crate::config::FractionalNumbers;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    /// Raw binary payload. Not a supported scalar: conversion rejects it.
    Bytes(Vec<u8>),
    Map(IndexMap<String, Document>),
    Sequence(Vec<Document>),
}

impl Document {
    /// Convert a JSON value, reading fractional numbers according to `mode`
    pub fn from_json(value: Value, mode: FractionalNumbers) -> Self {
        match value {
            Value::Null => Document::Null,
            Value::Bool(b) => Document::Bool(b),
            Value::Number(n) => Self::from_number(&n, mode),
            Value::String(s) => Document::Text(s),
            Value::Array(arr) => Document::Sequence(
                arr.into_iter()
                    .map(|item| Self::from_json(item, mode))
                    .collect(),
            ),
            Value::Object(obj) => Document::Map(
                obj.into_iter()
                    .map(|(key, item)| (key, Self::from_json(item, mode)))
                    .collect(),
            ),
        }
    }

    fn from_number(n: &Number, mode: FractionalNumbers) -> Self {
        if let Some(i) = n.as_i64() {
            return Document::Integer(i);
        }

        // Beyond i64 but still exact
        if let Some(u) = n.as_u64() {
            return Document::Decimal(Decimal::from(u));
        }

        let float = n.as_f64().unwrap_or(f64::NAN);
        match mode {
            FractionalNumbers::Float => Document::Float(float),
            FractionalNumbers::Decimal => {
                let text = n.to_string();
                match Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)) {
                    Ok(d) => Document::Decimal(d),
                    Err(e) => {
                        tracing::warn!(number = %text, error = %e, "number does not fit a decimal, keeping float");
                        Document::Float(float)
                    }
                }
            }
        }
    }

    /// Short name of the value's shape, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Null => "null",
            Document::Bool(_) => "boolean",
            Document::Integer(_) => "integer",
            Document::Float(_) => "float",
            Document::Decimal(_) => "decimal",
            Document::Text(_) => "text",
            Document::Bytes(_) => "bytes",
            Document::Map(_) => "map",
            Document::Sequence(_) => "sequence",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Document::Null
                | Document::Bool(_)
                | Document::Integer(_)
                | Document::Float(_)
                | Document::Decimal(_)
                | Document::Text(_)
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Document::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a field when this is a map
    pub fn get(&self, key: &str) -> Option<&Document> {
        match self {
            Document::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Document::from_json(value, FractionalNumbers::default())
    }
}

impl From<Decimal> for Document {
    fn from(value: Decimal) -> Self {
        Document::Decimal(value)
    }
}

impl From<&str> for Document {
    fn from(value: &str) -> Self {
        Document::Text(value.to_string())
    }
}

impl From<i64> for Document {
    fn from(value: i64) -> Self {
        Document::Integer(value)
    }
}

impl FromIterator<(String, Document)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Document)>>(iter: I) -> Self {
        Document::Map(iter.into_iter().collect())
    }
}
