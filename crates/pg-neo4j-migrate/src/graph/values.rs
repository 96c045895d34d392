//! Value and metadata conversion between rows and graph properties.
//!
//! Nodes carry their originating column types in a reserved `_types`
//! property (`name:TAG` pairs joined with `;`), which is what makes the
//! reverse migration able to synthesize typed columns. NULL values are
//! never written: the graph store has no stored null, so a missing
//! property reads back as NULL of the column's type.
//!
//! Decimals and UUIDs travel as strings: the graph value model cannot hold
//! them natively, and stringifying round-trips them exactly where a float
//! detour would corrupt precision.

use std::str::FromStr;

use neo4rs::{
    BoltBoolean, BoltBytes, BoltDate, BoltDateTime, BoltFloat, BoltInteger, BoltLocalDateTime,
    BoltLocalTime, BoltType, Node,
};

use crate::error::{MigrateError, Result};
use crate::schema::{Column, SqlValue};
use crate::typemap::CanonicalType;

/// Reserved node property carrying embedded type metadata.
pub const TYPES_PROPERTY: &str = "_types";

/// Encode a column list into the `_types` property payload.
pub fn encode_type_metadata(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| format!("{}:{}", c.name, c.ty.tag()))
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse a `_types` payload back into (name, canonical type) pairs.
/// Malformed entries are dropped; unknown tags degrade to TEXT.
pub fn parse_type_metadata(raw: &str) -> Vec<(String, CanonicalType)> {
    raw.split(';')
        .filter_map(|entry| {
            let (name, tag) = entry.split_once(':')?;
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), CanonicalType::parse_tag(tag)))
        })
        .collect()
}

/// Convert a value to its bolt representation. NULLs return `None` and are
/// omitted from the property map.
pub fn to_bolt(value: &SqlValue) -> Option<BoltType> {
    match value {
        SqlValue::Null(_) => None,
        SqlValue::Bool(b) => Some(BoltType::Boolean(BoltBoolean::new(*b))),
        SqlValue::I16(n) => Some(BoltType::Integer(BoltInteger::new(*n as i64))),
        SqlValue::I32(n) => Some(BoltType::Integer(BoltInteger::new(*n as i64))),
        SqlValue::I64(n) => Some(BoltType::Integer(BoltInteger::new(*n))),
        SqlValue::F32(n) => Some(BoltType::Float(BoltFloat::new(*n as f64))),
        SqlValue::F64(n) => Some(BoltType::Float(BoltFloat::new(*n))),
        SqlValue::Text(s) => Some(BoltType::String(s.as_str().into())),
        SqlValue::Bytes(b) => Some(BoltType::Bytes(BoltBytes::new(b.clone().into()))),
        SqlValue::Uuid(u) => Some(BoltType::String(u.to_string().into())),
        SqlValue::Decimal(d) => Some(BoltType::String(d.to_string().into())),
        SqlValue::Date(d) => Some(BoltType::Date(BoltDate::from(*d))),
        SqlValue::Time(t) => Some(BoltType::LocalTime(BoltLocalTime::from(*t))),
        SqlValue::DateTime(dt) => Some(BoltType::LocalDateTime(BoltLocalDateTime::from(*dt))),
        SqlValue::DateTimeTz(dt) => Some(BoltType::DateTime(BoltDateTime::from(*dt))),
        SqlValue::Json(v) => Some(BoltType::String(v.to_string().into())),
    }
}

/// Extract one property from a node, typed by the canonical column type.
/// A missing property reads as the column's NULL.
pub fn extract_property(
    node: &Node,
    key: &str,
    ty: &CanonicalType,
    scope: &str,
) -> Result<SqlValue> {
    if !node.keys().iter().any(|k| *k == key) {
        return Ok(SqlValue::null_for(ty));
    }

    let fail = |e: &dyn std::fmt::Display| {
        MigrateError::write(scope, format!("property {}: {}", key, e))
    };

    let value = match ty {
        CanonicalType::Boolean => SqlValue::Bool(node.get::<bool>(key).map_err(|e| fail(&e))?),
        CanonicalType::Int16 => SqlValue::I16(node.get::<i64>(key).map_err(|e| fail(&e))? as i16),
        CanonicalType::Int32 => SqlValue::I32(node.get::<i64>(key).map_err(|e| fail(&e))? as i32),
        CanonicalType::Int64 => SqlValue::I64(node.get::<i64>(key).map_err(|e| fail(&e))?),
        CanonicalType::Float32 => SqlValue::F32(node.get::<f64>(key).map_err(|e| fail(&e))? as f32),
        CanonicalType::Float64 => SqlValue::F64(node.get::<f64>(key).map_err(|e| fail(&e))?),
        CanonicalType::Decimal { .. } => {
            let raw = node.get::<String>(key).map_err(|e| fail(&e))?;
            SqlValue::Decimal(rust_decimal::Decimal::from_str(&raw).map_err(|e| fail(&e))?)
        }
        CanonicalType::Char(_) | CanonicalType::Varchar(_) | CanonicalType::Text => {
            SqlValue::Text(node.get::<String>(key).map_err(|e| fail(&e))?)
        }
        CanonicalType::Date => {
            SqlValue::Date(node.get::<chrono::NaiveDate>(key).map_err(|e| fail(&e))?)
        }
        CanonicalType::Time => {
            SqlValue::Time(node.get::<chrono::NaiveTime>(key).map_err(|e| fail(&e))?)
        }
        CanonicalType::DateTime => {
            SqlValue::DateTime(node.get::<chrono::NaiveDateTime>(key).map_err(|e| fail(&e))?)
        }
        CanonicalType::DateTimeTz => SqlValue::DateTimeTz(
            node.get::<chrono::DateTime<chrono::FixedOffset>>(key)
                .map_err(|e| fail(&e))?,
        ),
        CanonicalType::Blob => SqlValue::Bytes(node.get::<Vec<u8>>(key).map_err(|e| fail(&e))?),
        CanonicalType::Uuid => {
            let raw = node.get::<String>(key).map_err(|e| fail(&e))?;
            SqlValue::Uuid(uuid::Uuid::parse_str(&raw).map_err(|e| fail(&e))?)
        }
        CanonicalType::Json => {
            let raw = node.get::<String>(key).map_err(|e| fail(&e))?;
            SqlValue::Json(serde_json::from_str(&raw).map_err(|e| fail(&e))?)
        }
    };
    Ok(value)
}

/// Best-effort extraction when no type metadata exists: everything becomes
/// text (the conservative generic type).
pub fn extract_lenient(node: &Node, key: &str) -> SqlValue {
    if !node.keys().iter().any(|k| *k == key) {
        return SqlValue::null_for(&CanonicalType::Text);
    }
    if let Ok(s) = node.get::<String>(key) {
        return SqlValue::Text(s);
    }
    if let Ok(n) = node.get::<i64>(key) {
        return SqlValue::Text(n.to_string());
    }
    if let Ok(f) = node.get::<f64>(key) {
        return SqlValue::Text(f.to_string());
    }
    if let Ok(b) = node.get::<bool>(key) {
        return SqlValue::Text(b.to_string());
    }
    SqlValue::null_for(&CanonicalType::Text)
}

/// Classify a relationship property value (read as JSON) into a column
/// type and value for the synthesized association table.
pub fn relationship_property(value: &serde_json::Value) -> Option<(CanonicalType, SqlValue)> {
    match value {
        serde_json::Value::Bool(b) => Some((CanonicalType::Boolean, SqlValue::Bool(*b))),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some((CanonicalType::Int64, SqlValue::I64(i)))
            } else {
                n.as_f64()
                    .map(|f| (CanonicalType::Float64, SqlValue::F64(f)))
            }
        }
        serde_json::Value::String(s) => Some((CanonicalType::Text, SqlValue::Text(s.clone()))),
        serde_json::Value::Null => None,
        other => Some((CanonicalType::Text, SqlValue::Text(other.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ty: CanonicalType) -> Column {
        Column {
            name: name.into(),
            ty,
            is_nullable: true,
            pk_ordinal: 0,
            default: None,
        }
    }

    #[test]
    fn test_metadata_round_trip() {
        let columns = vec![
            col("id", CanonicalType::Int64),
            col("name", CanonicalType::Varchar(40)),
            col("price", CanonicalType::Decimal { precision: 18, scale: 2 }),
        ];
        let encoded = encode_type_metadata(&columns);
        assert_eq!(encoded, "id:BIGINT;name:VARCHAR(40);price:DECIMAL(18,2)");

        let parsed = parse_type_metadata(&encoded);
        assert_eq!(
            parsed,
            vec![
                ("id".to_string(), CanonicalType::Int64),
                ("name".to_string(), CanonicalType::Varchar(40)),
                (
                    "price".to_string(),
                    CanonicalType::Decimal { precision: 18, scale: 2 }
                ),
            ]
        );
    }

    #[test]
    fn test_malformed_metadata_entries_dropped() {
        let parsed = parse_type_metadata("id:BIGINT;garbage;:TEXT");
        assert_eq!(parsed, vec![("id".to_string(), CanonicalType::Int64)]);
    }

    #[test]
    fn test_nulls_are_omitted() {
        assert!(to_bolt(&SqlValue::null_for(&CanonicalType::Text)).is_none());
        assert!(to_bolt(&SqlValue::I64(1)).is_some());
    }

    #[test]
    fn test_relationship_property_typing() {
        let (ty, v) = relationship_property(&serde_json::json!(42)).unwrap();
        assert_eq!(ty, CanonicalType::Int64);
        assert_eq!(v, SqlValue::I64(42));

        let (ty, _) = relationship_property(&serde_json::json!("note")).unwrap();
        assert_eq!(ty, CanonicalType::Text);

        assert!(relationship_property(&serde_json::Value::Null).is_none());
    }
}
