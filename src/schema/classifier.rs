//! Scalar type classification and column widening
//!
//! Classification is stateless: every function here takes the column's
//! current state and returns its next state, leaving it to the caller to
//! store the result.

use super::model::{AbstractType, Column};
use crate::document::Document;
use crate::error::{Error, Result};
use tracing::{debug, trace};

/// What to do when a column that holds `stored` observes another type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The stored type already covers the observation
    Keep,
    /// Replace the stored type with a wider one
    Widen(AbstractType),
    /// The types cannot share a column
    Reject,
}

/// Compatibility table for non-primary-key columns
pub fn resolve(stored: AbstractType, observed: AbstractType) -> Resolution {
    use AbstractType::*;

    match (stored, observed) {
        (s, o) if s == o => Resolution::Keep,
        // Nullability is tracked separately from the type
        (_, Null) => Resolution::Keep,
        // A column that has only seen nulls adopts the first real type
        (Null | Opaque, o) => Resolution::Widen(o),
        // Widening is one-way: an Integer on a Decimal column is a conflict
        (Integer, Decimal) => Resolution::Widen(Decimal),
        _ => Resolution::Reject,
    }
}

/// Abstract type of a scalar value, or `None` when the value is not a scalar
pub fn classify(value: &Document) -> Option<AbstractType> {
    match value {
        Document::Null => Some(AbstractType::Null),
        Document::Bool(_) => Some(AbstractType::Boolean),
        Document::Integer(_) => Some(AbstractType::Integer),
        Document::Float(_) => Some(AbstractType::Float),
        Document::Decimal(_) => Some(AbstractType::Decimal),
        Document::Text(_) => Some(AbstractType::Text),
        Document::Bytes(_) | Document::Map(_) | Document::Sequence(_) => None,
    }
}

/// One scalar seen in a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub column_type: AbstractType,
    pub is_null: bool,
}

/// Classify `value`, letting a column type hint take precedence over the
/// value itself. A null under a hint still counts as null.
pub fn observe(value: &Document, hint: Option<AbstractType>) -> Option<Observation> {
    let classified = classify(value)?;

    Some(Observation {
        column_type: hint.unwrap_or(classified),
        is_null: classified == AbstractType::Null,
    })
}

/// The column a table slot identifies
#[derive(Debug, Clone, Copy)]
pub struct Slot<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub primary_key: bool,
}

/// Next state of the column at `slot` after `obs`
pub fn merge(slot: Slot<'_>, current: Option<&Column>, obs: Observation) -> Result<Column> {
    let Some(existing) = current else {
        let column_type = match obs.column_type {
            AbstractType::Null => AbstractType::Opaque,
            other => other,
        };
        trace!(
            table = slot.table,
            column = slot.column,
            column_type = %column_type,
            nullable = obs.is_null,
            "adding column"
        );
        return Ok(Column::new(slot.column, column_type, obs.is_null));
    };

    let mut next = existing.clone();

    if slot.primary_key {
        // The synthetic Integer key gives way to whatever identity the data carries
        if !obs.is_null && existing.column_type != obs.column_type {
            debug!(
                table = slot.table,
                column = slot.column,
                from = %existing.column_type,
                to = %obs.column_type,
                "retyping primary key"
            );
            next.column_type = obs.column_type;
        }
        return Ok(next);
    }

    match resolve(existing.column_type, obs.column_type) {
        Resolution::Keep => {}
        Resolution::Widen(wider) => {
            debug!(
                table = slot.table,
                column = slot.column,
                from = %existing.column_type,
                to = %wider,
                "widening column"
            );
            next.column_type = wider;
        }
        Resolution::Reject => {
            return Err(Error::ColumnConflict {
                table: slot.table.to_string(),
                column: slot.column.to_string(),
                existing: existing.column_type,
                observed: obs.column_type,
            });
        }
    }

    if obs.is_null && !next.nullable {
        debug!(table = slot.table, column = slot.column, "marking column nullable");
        next.nullable = true;
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    const ALL: [AbstractType; 7] = [
        AbstractType::Null,
        AbstractType::Boolean,
        AbstractType::Integer,
        AbstractType::Float,
        AbstractType::Decimal,
        AbstractType::Text,
        AbstractType::Opaque,
    ];

    fn slot(column: &str) -> Slot<'_> {
        Slot {
            table: "t",
            column,
            primary_key: false,
        }
    }

    fn seen(column_type: AbstractType) -> Observation {
        Observation {
            column_type,
            is_null: column_type == AbstractType::Null,
        }
    }

    #[test]
    fn test_classify_scalars() {
        assert_eq!(classify(&Document::Null), Some(AbstractType::Null));
        assert_eq!(classify(&Document::Bool(false)), Some(AbstractType::Boolean));
        assert_eq!(classify(&Document::Integer(1)), Some(AbstractType::Integer));
        assert_eq!(classify(&Document::Float(1.5)), Some(AbstractType::Float));
        assert_eq!(
            classify(&Document::Decimal(Decimal::new(15, 1))),
            Some(AbstractType::Decimal)
        );
        assert_eq!(classify(&Document::from("x")), Some(AbstractType::Text));
    }

    #[test]
    fn test_classify_declines_non_scalars() {
        assert_eq!(classify(&Document::from(json!({"a": 1}))), None);
        assert_eq!(classify(&Document::from(json!([1]))), None);
        assert_eq!(classify(&Document::Bytes(vec![0])), None);
    }

    #[test]
    fn test_resolve_table() {
        use AbstractType as T;

        for t in ALL {
            assert_eq!(resolve(t, t), Resolution::Keep);
            assert_eq!(resolve(t, T::Null), Resolution::Keep);
        }
        for t in ALL.into_iter().filter(|t| *t != T::Opaque && *t != T::Null) {
            assert_eq!(resolve(T::Opaque, t), Resolution::Widen(t));
        }

        assert_eq!(resolve(T::Integer, T::Decimal), Resolution::Widen(T::Decimal));
        assert_eq!(resolve(T::Decimal, T::Integer), Resolution::Reject);
        assert_eq!(resolve(T::Text, T::Integer), Resolution::Reject);
        assert_eq!(resolve(T::Boolean, T::Decimal), Resolution::Reject);
        assert_eq!(resolve(T::Integer, T::Float), Resolution::Reject);
        assert_eq!(resolve(T::Float, T::Decimal), Resolution::Reject);
    }

    #[test]
    fn test_hint_overrides_value() {
        let obs = observe(&Document::Integer(3), Some(AbstractType::Text)).unwrap();
        assert_eq!(obs.column_type, AbstractType::Text);
        assert!(!obs.is_null);

        let obs = observe(&Document::Null, Some(AbstractType::Decimal)).unwrap();
        assert_eq!(obs.column_type, AbstractType::Decimal);
        assert!(obs.is_null);
    }

    #[test]
    fn test_hint_does_not_make_map_scalar() {
        assert_eq!(observe(&Document::from(json!({})), Some(AbstractType::Text)), None);
    }

    #[test]
    fn test_fresh_null_column_is_opaque() {
        let column = merge(slot("a"), None, seen(AbstractType::Null)).unwrap();
        assert_eq!(column, Column::new("a", AbstractType::Opaque, true));
    }

    #[test]
    fn test_opaque_adopts_first_type_and_stays_nullable() {
        let opaque = Column::new("a", AbstractType::Opaque, true);
        let column = merge(slot("a"), Some(&opaque), seen(AbstractType::Text)).unwrap();
        assert_eq!(column, Column::new("a", AbstractType::Text, true));
    }

    #[test]
    fn test_integer_widens_and_never_narrows() {
        let int = Column::new("a", AbstractType::Integer, false);
        let widened = merge(slot("a"), Some(&int), seen(AbstractType::Decimal)).unwrap();
        assert_eq!(widened.column_type, AbstractType::Decimal);

        let err = merge(slot("a"), Some(&widened), seen(AbstractType::Integer)).unwrap_err();
        assert!(matches!(
            err,
            Error::ColumnConflict {
                existing: AbstractType::Decimal,
                observed: AbstractType::Integer,
                ..
            }
        ));
    }

    #[test]
    fn test_nullable_is_sticky() {
        let text = Column::new("a", AbstractType::Text, false);
        let nullable = merge(slot("a"), Some(&text), seen(AbstractType::Null)).unwrap();
        assert!(nullable.nullable);
        assert_eq!(nullable.column_type, AbstractType::Text);

        let still = merge(slot("a"), Some(&nullable), seen(AbstractType::Text)).unwrap();
        assert!(still.nullable);
    }

    #[test]
    fn test_conflict_reports_types() {
        let int = Column::new("a", AbstractType::Integer, false);
        let err = merge(slot("a"), Some(&int), seen(AbstractType::Text)).unwrap_err();

        match err {
            Error::ColumnConflict {
                table,
                column,
                existing,
                observed,
            } => {
                assert_eq!(table, "t");
                assert_eq!(column, "a");
                assert_eq!(existing, AbstractType::Integer);
                assert_eq!(observed, AbstractType::Text);
            }
            other => panic!("Expected ColumnConflict, got: {:?}", other),
        }
    }

    #[test]
    fn test_primary_key_adopts_any_type() {
        let pk_slot = Slot {
            table: "t",
            column: "id",
            primary_key: true,
        };
        let pk = Column::new("id", AbstractType::Integer, false);

        let text = merge(pk_slot, Some(&pk), seen(AbstractType::Text)).unwrap();
        assert_eq!(text.column_type, AbstractType::Text);

        let boolean = merge(pk_slot, Some(&text), seen(AbstractType::Boolean)).unwrap();
        assert_eq!(boolean.column_type, AbstractType::Boolean);

        let null = merge(pk_slot, Some(&boolean), seen(AbstractType::Null)).unwrap();
        assert_eq!(null, boolean);
    }
}
