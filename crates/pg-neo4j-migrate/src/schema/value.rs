//! SQL value enum for type-safe row handling.
//!
//! Values travel from relational reads to graph properties and back. For
//! relational writes, every value is stringified and paired with an explicit
//! SQL cast (`$1::int8` style) so one parameter strategy covers every
//! column type.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

use crate::typemap::CanonicalType;

/// Type hint for NULL values so casts and wire encoding stay correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    Text,
    Bytes,
    Uuid,
    Decimal,
    Date,
    Time,
    DateTime,
    DateTimeTz,
    Json,
}

impl SqlNullType {
    /// The null hint matching a canonical column type.
    pub fn for_type(ty: &CanonicalType) -> Self {
        match ty {
            CanonicalType::Boolean => SqlNullType::Bool,
            CanonicalType::Int16 => SqlNullType::I16,
            CanonicalType::Int32 => SqlNullType::I32,
            CanonicalType::Int64 => SqlNullType::I64,
            CanonicalType::Float32 => SqlNullType::F32,
            CanonicalType::Float64 => SqlNullType::F64,
            CanonicalType::Decimal { .. } => SqlNullType::Decimal,
            CanonicalType::Char(_) | CanonicalType::Varchar(_) | CanonicalType::Text => {
                SqlNullType::Text
            }
            CanonicalType::Date => SqlNullType::Date,
            CanonicalType::Time => SqlNullType::Time,
            CanonicalType::DateTime => SqlNullType::DateTime,
            CanonicalType::DateTimeTz => SqlNullType::DateTimeTz,
            CanonicalType::Blob => SqlNullType::Bytes,
            CanonicalType::Uuid => SqlNullType::Uuid,
            CanonicalType::Json => SqlNullType::Json,
        }
    }
}

/// SQL value enum for type-safe row handling.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL with type hint for correct cast selection.
    Null(SqlNullType),
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Decimal(Decimal),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeTz(DateTime<FixedOffset>),
    Json(serde_json::Value),
}

impl SqlValue {
    /// A typed NULL for the given canonical column type.
    pub fn null_for(ty: &CanonicalType) -> Self {
        SqlValue::Null(SqlNullType::for_type(ty))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Integer view, used for key matching during import inference.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I16(n) => Some(*n as i64),
            SqlValue::I32(n) => Some(*n as i64),
            SqlValue::I64(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this value can be stored in a column of canonical type `ty`.
    pub fn conforms_to(&self, ty: &CanonicalType) -> bool {
        match self {
            SqlValue::Null(_) => true,
            SqlValue::Bool(_) => matches!(ty, CanonicalType::Boolean),
            SqlValue::I16(_) | SqlValue::I32(_) | SqlValue::I64(_) => ty.is_integer(),
            SqlValue::F32(_) | SqlValue::F64(_) => {
                matches!(ty, CanonicalType::Float32 | CanonicalType::Float64)
            }
            SqlValue::Text(_) => matches!(
                ty,
                CanonicalType::Char(_) | CanonicalType::Varchar(_) | CanonicalType::Text
            ),
            SqlValue::Bytes(_) => matches!(ty, CanonicalType::Blob),
            SqlValue::Uuid(_) => matches!(ty, CanonicalType::Uuid),
            SqlValue::Decimal(_) => matches!(ty, CanonicalType::Decimal { .. }),
            SqlValue::Date(_) => matches!(ty, CanonicalType::Date),
            SqlValue::Time(_) => matches!(ty, CanonicalType::Time),
            SqlValue::DateTime(_) => matches!(ty, CanonicalType::DateTime),
            SqlValue::DateTimeTz(_) => matches!(ty, CanonicalType::DateTimeTz),
            SqlValue::Json(_) => matches!(ty, CanonicalType::Json),
        }
    }

    /// Explicit SQL cast appended to this value's placeholder.
    pub fn sql_cast(&self) -> &'static str {
        match self {
            SqlValue::Null(hint) => match hint {
                SqlNullType::Bool => "::boolean",
                SqlNullType::I16 => "::int2",
                SqlNullType::I32 => "::int4",
                SqlNullType::I64 => "::int8",
                SqlNullType::F32 => "::float4",
                SqlNullType::F64 => "::float8",
                SqlNullType::Text => "",
                SqlNullType::Bytes => "::bytea",
                SqlNullType::Uuid => "::uuid",
                SqlNullType::Decimal => "::numeric",
                SqlNullType::Date => "::date",
                SqlNullType::Time => "::time",
                SqlNullType::DateTime => "::timestamp",
                SqlNullType::DateTimeTz => "::timestamptz",
                SqlNullType::Json => "::jsonb",
            },
            SqlValue::Bool(_) => "::boolean",
            SqlValue::I16(_) => "::int2",
            SqlValue::I32(_) => "::int4",
            SqlValue::I64(_) => "::int8",
            SqlValue::F32(_) => "::float4",
            SqlValue::F64(_) => "::float8",
            SqlValue::Text(_) => "",
            SqlValue::Bytes(_) => "::bytea",
            SqlValue::Uuid(_) => "::uuid",
            SqlValue::Decimal(_) => "::numeric",
            SqlValue::Date(_) => "::date",
            SqlValue::Time(_) => "::time",
            SqlValue::DateTime(_) => "::timestamp",
            SqlValue::DateTimeTz(_) => "::timestamptz",
            SqlValue::Json(_) => "::jsonb",
        }
    }

    /// Convert to a boxed query parameter. All values are sent as strings;
    /// the server casts them via the placeholder's explicit cast.
    pub fn to_param(&self) -> Box<dyn ToSql + Sync + Send> {
        match self {
            SqlValue::Null(_) => Box::new(None::<String>),
            SqlValue::Bool(b) => Box::new(if *b { "t".to_string() } else { "f".to_string() }),
            SqlValue::I16(n) => Box::new(n.to_string()),
            SqlValue::I32(n) => Box::new(n.to_string()),
            SqlValue::I64(n) => Box::new(n.to_string()),
            SqlValue::F32(n) => Box::new(n.to_string()),
            SqlValue::F64(n) => Box::new(n.to_string()),
            SqlValue::Text(s) => Box::new(s.clone()),
            SqlValue::Bytes(b) => Box::new(format!("\\x{}", hex::encode(b))),
            SqlValue::Uuid(u) => Box::new(u.to_string()),
            SqlValue::Decimal(d) => Box::new(d.to_string()),
            SqlValue::Date(d) => Box::new(d.to_string()),
            SqlValue::Time(t) => Box::new(t.to_string()),
            SqlValue::DateTime(dt) => Box::new(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
            SqlValue::DateTimeTz(dt) => Box::new(dt.to_rfc3339()),
            SqlValue::Json(v) => Box::new(v.to_string()),
        }
    }
}
