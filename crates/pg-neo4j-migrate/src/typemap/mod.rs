//! Canonical type system for cross-store type mapping.
//!
//! Both stores speak their own type vocabulary (PostgreSQL `udt_name`
//! strings on one side, property-type tags embedded in node metadata on the
//! other). [`CanonicalType`] is the hub both sides translate through, so
//! each direction only needs one mapping instead of a full cross product.
//!
//! Native names are resolved with an ordered, case-insensitive substring
//! rule table; the first matching rule wins, so more specific names come
//! first (`BIGINT` before `INT`, `TIMESTAMPTZ` before `TIMESTAMP` before
//! `TIME`). Unrecognized names degrade to [`CanonicalType::Text`] with a
//! warning; type resolution never fails an introspection pass.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Store-agnostic column/property type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalType {
    Boolean,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    Float32,
    Float64,
    /// Exact decimal. `precision == 0` means unconstrained.
    Decimal { precision: u8, scale: u8 },
    /// Fixed-length character string. 0 means unspecified.
    Char(u32),
    /// Variable-length character string. 0 means unlimited.
    Varchar(u32),
    Text,
    Date,
    Time,
    /// Date and time without timezone.
    DateTime,
    /// Date and time with timezone.
    DateTimeTz,
    /// Binary data.
    Blob,
    Uuid,
    Json,
}

/// One rule in the resolution table: any of `patterns` appearing in the
/// uppercased native name selects `build`.
struct Rule {
    patterns: &'static [&'static str],
    build: fn(i32, i32, i32) -> CanonicalType,
}

/// Ordered rule table. Most specific patterns first: a rule only fires if
/// no earlier rule matched, which is what disambiguates `BIGINT` from
/// `INT`, `TIMESTAMPTZ` from `TIMESTAMP` from `TIME`, `DATETIME` from
/// `DATE`, and `VARCHAR` from `CHAR`.
const RULES: &[Rule] = &[
    Rule {
        patterns: &["TIMESTAMPTZ", "DATETIMETZ", "DATETIMEOFFSET"],
        build: |_, _, _| CanonicalType::DateTimeTz,
    },
    Rule {
        patterns: &["TIMESTAMP", "DATETIME"],
        build: |_, _, _| CanonicalType::DateTime,
    },
    Rule {
        patterns: &["TIME"],
        build: |_, _, _| CanonicalType::Time,
    },
    Rule {
        patterns: &["DATE"],
        build: |_, _, _| CanonicalType::Date,
    },
    Rule {
        patterns: &["BIGSERIAL", "SERIAL8", "BIGINT", "INT8"],
        build: |_, _, _| CanonicalType::Int64,
    },
    Rule {
        patterns: &["SMALLINT", "INT2", "TINYINT"],
        build: |_, _, _| CanonicalType::Int16,
    },
    Rule {
        patterns: &["INT", "SERIAL"],
        build: |_, _, _| CanonicalType::Int32,
    },
    Rule {
        patterns: &["DOUBLE", "FLOAT8"],
        build: |_, _, _| CanonicalType::Float64,
    },
    Rule {
        patterns: &["REAL", "FLOAT4"],
        build: |_, _, _| CanonicalType::Float32,
    },
    Rule {
        patterns: &["FLOAT"],
        build: |_, _, _| CanonicalType::Float64,
    },
    Rule {
        patterns: &["DECIMAL", "NUMERIC", "MONEY"],
        build: |_, precision, scale| CanonicalType::Decimal {
            precision: precision.clamp(0, 255) as u8,
            scale: scale.clamp(0, 255) as u8,
        },
    },
    Rule {
        patterns: &["BOOL", "BIT"],
        build: |_, _, _| CanonicalType::Boolean,
    },
    Rule {
        patterns: &["UUID", "UNIQUEIDENTIFIER"],
        build: |_, _, _| CanonicalType::Uuid,
    },
    Rule {
        patterns: &["JSON"],
        build: |_, _, _| CanonicalType::Json,
    },
    Rule {
        patterns: &["BYTEA", "BLOB", "BINARY", "IMAGE"],
        build: |_, _, _| CanonicalType::Blob,
    },
    Rule {
        patterns: &["VARCHAR", "VARYING"],
        build: |len, _, _| CanonicalType::Varchar(len.max(0) as u32),
    },
    Rule {
        patterns: &["BPCHAR", "CHAR"],
        build: |len, _, _| CanonicalType::Char(len.max(0) as u32),
    },
    Rule {
        patterns: &["TEXT", "STRING", "CLOB"],
        build: |_, _, _| CanonicalType::Text,
    },
];

impl CanonicalType {
    /// Resolve a native SQL type name to its canonical form.
    ///
    /// `max_length` is the declared character length (0 or negative when
    /// not applicable / unlimited); `precision`/`scale` apply to numerics.
    pub fn from_sql(type_name: &str, max_length: i32, precision: i32, scale: i32) -> Self {
        let upper = type_name.to_uppercase();
        for rule in RULES {
            if rule.patterns.iter().any(|p| upper.contains(p)) {
                return (rule.build)(max_length, precision, scale);
            }
        }
        warn!(
            "Unrecognized column type '{}' - falling back to TEXT",
            type_name
        );
        CanonicalType::Text
    }

    /// Render the canonical tag carried in graph node metadata.
    pub fn tag(&self) -> String {
        match self {
            CanonicalType::Boolean => "BOOLEAN".into(),
            CanonicalType::Int16 => "SMALLINT".into(),
            CanonicalType::Int32 => "INTEGER".into(),
            CanonicalType::Int64 => "BIGINT".into(),
            CanonicalType::Float32 => "REAL".into(),
            CanonicalType::Float64 => "DOUBLE".into(),
            CanonicalType::Decimal { precision: 0, .. } => "DECIMAL".into(),
            CanonicalType::Decimal { precision, scale } => {
                format!("DECIMAL({},{})", precision, scale)
            }
            CanonicalType::Char(0) => "CHAR".into(),
            CanonicalType::Char(n) => format!("CHAR({})", n),
            CanonicalType::Varchar(0) => "VARCHAR".into(),
            CanonicalType::Varchar(n) => format!("VARCHAR({})", n),
            CanonicalType::Text => "TEXT".into(),
            CanonicalType::Date => "DATE".into(),
            CanonicalType::Time => "TIME".into(),
            CanonicalType::DateTime => "DATETIME".into(),
            CanonicalType::DateTimeTz => "DATETIMETZ".into(),
            CanonicalType::Blob => "BLOB".into(),
            CanonicalType::Uuid => "UUID".into(),
            CanonicalType::Json => "JSON".into(),
        }
    }

    /// Parse a canonical tag back. Inverse of [`tag`](Self::tag); unknown
    /// tags degrade to `Text` like any unrecognized native name.
    pub fn parse_tag(tag: &str) -> Self {
        let (base, args) = match tag.find('(') {
            Some(open) => {
                let base = &tag[..open];
                let inner = tag[open + 1..].trim_end_matches(')');
                (base, Some(inner))
            }
            None => (tag, None),
        };

        let mut len = 0i32;
        let mut precision = 0i32;
        let mut scale = 0i32;
        if let Some(inner) = args {
            let parts: Vec<&str> = inner.split(',').collect();
            match parts.as_slice() {
                [one] => {
                    len = one.trim().parse().unwrap_or(0);
                    precision = len;
                }
                [p, s] => {
                    precision = p.trim().parse().unwrap_or(0);
                    scale = s.trim().parse().unwrap_or(0);
                }
                _ => {}
            }
        }

        Self::from_sql(base, len, precision, scale)
    }

    /// Render the PostgreSQL DDL type for this canonical type.
    pub fn pg_type(&self) -> String {
        match self {
            CanonicalType::Boolean => "boolean".into(),
            CanonicalType::Int16 => "smallint".into(),
            CanonicalType::Int32 => "integer".into(),
            CanonicalType::Int64 => "bigint".into(),
            CanonicalType::Float32 => "real".into(),
            CanonicalType::Float64 => "double precision".into(),
            CanonicalType::Decimal { precision: 0, .. } => "numeric".into(),
            CanonicalType::Decimal { precision, scale } => {
                format!("numeric({},{})", precision, scale)
            }
            CanonicalType::Char(n) if *n > 0 && *n <= 10_485_760 => format!("char({})", n),
            CanonicalType::Char(_) => "text".into(),
            CanonicalType::Varchar(n) if *n > 0 && *n <= 10_485_760 => format!("varchar({})", n),
            CanonicalType::Varchar(_) => "text".into(),
            CanonicalType::Text => "text".into(),
            CanonicalType::Date => "date".into(),
            CanonicalType::Time => "time".into(),
            CanonicalType::DateTime => "timestamp".into(),
            CanonicalType::DateTimeTz => "timestamptz".into(),
            CanonicalType::Blob => "bytea".into(),
            CanonicalType::Uuid => "uuid".into(),
            CanonicalType::Json => "jsonb".into(),
        }
    }

    /// Whether values of this type are integers (used by foreign-key
    /// column inference on import).
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            CanonicalType::Int16 | CanonicalType::Int32 | CanonicalType::Int64
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_rules_win() {
        assert_eq!(CanonicalType::from_sql("bigint", 0, 0, 0), CanonicalType::Int64);
        assert_eq!(CanonicalType::from_sql("int8", 0, 0, 0), CanonicalType::Int64);
        assert_eq!(CanonicalType::from_sql("smallint", 0, 0, 0), CanonicalType::Int16);
        assert_eq!(CanonicalType::from_sql("int", 0, 0, 0), CanonicalType::Int32);
        assert_eq!(CanonicalType::from_sql("integer", 0, 0, 0), CanonicalType::Int32);
    }

    #[test]
    fn test_temporal_rule_order() {
        assert_eq!(
            CanonicalType::from_sql("timestamptz", 0, 0, 0),
            CanonicalType::DateTimeTz
        );
        assert_eq!(
            CanonicalType::from_sql("timestamp", 0, 0, 0),
            CanonicalType::DateTime
        );
        assert_eq!(CanonicalType::from_sql("datetime", 0, 0, 0), CanonicalType::DateTime);
        assert_eq!(CanonicalType::from_sql("time", 0, 0, 0), CanonicalType::Time);
        assert_eq!(CanonicalType::from_sql("date", 0, 0, 0), CanonicalType::Date);
    }

    #[test]
    fn test_char_family() {
        assert_eq!(
            CanonicalType::from_sql("varchar", 120, 0, 0),
            CanonicalType::Varchar(120)
        );
        assert_eq!(
            CanonicalType::from_sql("character varying", 0, 0, 0),
            CanonicalType::Varchar(0)
        );
        assert_eq!(CanonicalType::from_sql("bpchar", 8, 0, 0), CanonicalType::Char(8));
        assert_eq!(CanonicalType::from_sql("text", 0, 0, 0), CanonicalType::Text);
    }

    #[test]
    fn test_numeric_and_special() {
        assert_eq!(
            CanonicalType::from_sql("numeric", 0, 18, 2),
            CanonicalType::Decimal { precision: 18, scale: 2 }
        );
        assert_eq!(CanonicalType::from_sql("float8", 0, 0, 0), CanonicalType::Float64);
        assert_eq!(CanonicalType::from_sql("real", 0, 0, 0), CanonicalType::Float32);
        assert_eq!(CanonicalType::from_sql("bool", 0, 0, 0), CanonicalType::Boolean);
        assert_eq!(CanonicalType::from_sql("uuid", 0, 0, 0), CanonicalType::Uuid);
        assert_eq!(CanonicalType::from_sql("jsonb", 0, 0, 0), CanonicalType::Json);
        assert_eq!(CanonicalType::from_sql("bytea", 0, 0, 0), CanonicalType::Blob);
    }

    #[test]
    fn test_unrecognized_degrades_to_text() {
        assert_eq!(CanonicalType::from_sql("tsvector", 0, 0, 0), CanonicalType::Text);
        assert_eq!(CanonicalType::from_sql("", 0, 0, 0), CanonicalType::Text);
        assert_eq!(CanonicalType::parse_tag("WIDGET"), CanonicalType::Text);
    }

    #[test]
    fn test_tag_round_trip() {
        let all = vec![
            CanonicalType::Boolean,
            CanonicalType::Int16,
            CanonicalType::Int32,
            CanonicalType::Int64,
            CanonicalType::Float32,
            CanonicalType::Float64,
            CanonicalType::Decimal { precision: 18, scale: 2 },
            CanonicalType::Decimal { precision: 0, scale: 0 },
            CanonicalType::Char(8),
            CanonicalType::Varchar(255),
            CanonicalType::Varchar(0),
            CanonicalType::Text,
            CanonicalType::Date,
            CanonicalType::Time,
            CanonicalType::DateTime,
            CanonicalType::DateTimeTz,
            CanonicalType::Blob,
            CanonicalType::Uuid,
            CanonicalType::Json,
        ];
        for ty in all {
            assert_eq!(CanonicalType::parse_tag(&ty.tag()), ty, "tag {}", ty.tag());
        }
    }

    #[test]
    fn test_pg_type_rendering() {
        assert_eq!(CanonicalType::Varchar(255).pg_type(), "varchar(255)");
        assert_eq!(CanonicalType::Varchar(0).pg_type(), "text");
        assert_eq!(
            CanonicalType::Decimal { precision: 10, scale: 2 }.pg_type(),
            "numeric(10,2)"
        );
        assert_eq!(CanonicalType::Float64.pg_type(), "double precision");
        assert_eq!(CanonicalType::DateTime.pg_type(), "timestamp");
    }
}
