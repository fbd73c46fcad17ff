//! Conversion of raw JSON payload values into natively typed SQL values.
//!
//! Malformed numbers fall back to zero and malformed dates pass through untouched. Only
//! date-times that match none of the accepted layouts are rejected.

use crate::domain::schema::{ColumnDescriptor, ColumnKind};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

const TRUTHY: &[&str] = &["true", "yes", "1", "t", "y"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// A value ready to be bound into a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Absence, tagged with the column kind so it binds with the right type.
    Null(ColumnKind),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl SqlValue {
    /// JSON rendering used when echoing coerced fields back to a caller.
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Null(_) => JsonValue::Null,
            SqlValue::Integer(i) => JsonValue::from(*i),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            SqlValue::Bool(b) => JsonValue::from(*b),
            SqlValue::Date(d) => JsonValue::from(d.format("%Y-%m-%d").to_string()),
            SqlValue::DateTime(dt) => JsonValue::from(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            SqlValue::Text(s) => JsonValue::from(s.as_str()),
        }
    }
}

/// A value that cannot be coerced and for which no lenient fallback exists.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("column '{column}': {message}")]
pub struct CoercionError {
    pub column: String,
    pub message: String,
}

/// How a payload is being applied to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// New row: every writable column is considered, absent nullable columns become NULL.
    Create,
    /// Existing row: only columns present in the payload are touched.
    Update,
}

/// Coerces the payload entry for `column`, or returns `None` when the column must be left out of
/// the statement entirely (so the database default or the current value is kept).
pub fn coerce_field(
    column: &ColumnDescriptor,
    raw: Option<&JsonValue>,
    mode: FieldMode,
) -> Result<Option<SqlValue>, CoercionError> {
    match raw {
        None if mode == FieldMode::Update => Ok(None),
        None | Some(JsonValue::Null) => {
            if column.nullable {
                Ok(Some(SqlValue::Null(column.kind)))
            } else {
                Ok(None)
            }
        }
        Some(value) => coerce(column, value).map(Some),
    }
}

/// Converts one raw value according to the column's kind.
pub fn coerce(column: &ColumnDescriptor, raw: &JsonValue) -> Result<SqlValue, CoercionError> {
    if is_empty(raw) && column.nullable {
        return Ok(SqlValue::Null(column.kind));
    }

    let value = match column.kind {
        ColumnKind::Integer => SqlValue::Integer(parse_integer(column, raw)),
        ColumnKind::Float => SqlValue::Float(parse_float(column, raw)),
        ColumnKind::Bool => SqlValue::Bool(truthy(raw)),
        ColumnKind::Date => match raw.as_str().filter(|s| !s.is_empty()) {
            None => SqlValue::Null(ColumnKind::Date),
            Some(s) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(d) => SqlValue::Date(d),
                Err(e) => {
                    tracing::warn!(
                        column = %column.name,
                        value = %s,
                        error = %e,
                        "date conversion failed, passing value through"
                    );
                    SqlValue::Text(s.to_string())
                }
            },
        },
        ColumnKind::DateTime => match raw.as_str().filter(|s| !s.is_empty()) {
            None => SqlValue::Null(ColumnKind::DateTime),
            Some(s) => SqlValue::DateTime(parse_datetime(s).ok_or_else(|| CoercionError {
                column: column.name.clone(),
                message: format!("unrecognised datetime '{}'", s),
            })?),
        },
        ColumnKind::Text => SqlValue::Text(passthrough(raw)),
    };

    tracing::trace!(column = %column.name, ?value, "coerced");
    Ok(value)
}

fn is_empty(v: &JsonValue) -> bool {
    match v {
        JsonValue::Null => true,
        JsonValue::String(s) => s.is_empty(),
        _ => false,
    }
}

fn parse_integer(column: &ColumnDescriptor, raw: &JsonValue) -> i64 {
    let parsed = match raw {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        JsonValue::Bool(b) => Some(i64::from(*b)),
        JsonValue::String(s) if s.trim().is_empty() => Some(0),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        tracing::warn!(column = %column.name, value = %raw, "not an integer, using 0");
        0
    })
}

fn parse_float(column: &ColumnDescriptor, raw: &JsonValue) -> f64 {
    let parsed = match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        JsonValue::String(s) if s.trim().is_empty() => Some(0.0),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        tracing::warn!(column = %column.name, value = %raw, "not a number, using 0.0");
        0.0
    })
}

fn truthy(raw: &JsonValue) -> bool {
    match raw {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => {
            let lc = s.to_lowercase();
            TRUTHY.contains(&lc.as_str())
        }
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
        JsonValue::Null => false,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn passthrough(raw: &JsonValue) -> String {
    match raw {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn col(declared: &str, nullable: bool) -> ColumnDescriptor {
        ColumnDescriptor::new("field", declared, "x", nullable, false)
    }

    #[test]
    fn empty_on_nullable_is_typed_null() {
        for declared in ["INTEGER", "FLOAT", "BOOLEAN", "DATE", "DATETIME", "VARCHAR(20)"] {
            let c = col(declared, true);
            let v = coerce(&c, &json!("")).unwrap();
            assert_eq!(v, SqlValue::Null(c.kind), "{declared}");
        }
    }

    #[test]
    fn integers_are_lenient() {
        let c = col("INTEGER", false);
        assert_eq!(coerce(&c, &json!("42")).unwrap(), SqlValue::Integer(42));
        assert_eq!(coerce(&c, &json!(" 7 ")).unwrap(), SqlValue::Integer(7));
        assert_eq!(coerce(&c, &json!(13)).unwrap(), SqlValue::Integer(13));
        assert_eq!(coerce(&c, &json!("")).unwrap(), SqlValue::Integer(0));
        assert_eq!(coerce(&c, &json!("abc")).unwrap(), SqlValue::Integer(0));
        assert_eq!(coerce(&c, &json!(true)).unwrap(), SqlValue::Integer(1));
    }

    #[test]
    fn floats_are_lenient() {
        let c = col("NUMERIC(8,2)", false);
        assert_eq!(coerce(&c, &json!("3.25")).unwrap(), SqlValue::Float(3.25));
        assert_eq!(coerce(&c, &json!(2)).unwrap(), SqlValue::Float(2.0));
        assert_eq!(coerce(&c, &json!("")).unwrap(), SqlValue::Float(0.0));
        assert_eq!(coerce(&c, &json!("n/a")).unwrap(), SqlValue::Float(0.0));
    }

    #[test]
    fn booleans_follow_truthy_set() {
        let c = col("BOOLEAN", false);
        for yes in ["true", "YES", "1", "t", "Y"] {
            assert_eq!(coerce(&c, &json!(yes)).unwrap(), SqlValue::Bool(true), "{yes}");
        }
        for no in ["false", "no", "0", "", "maybe"] {
            assert_eq!(coerce(&c, &json!(no)).unwrap(), SqlValue::Bool(false), "{no}");
        }
        assert_eq!(coerce(&c, &json!(true)).unwrap(), SqlValue::Bool(true));
        assert_eq!(coerce(&c, &json!(0)).unwrap(), SqlValue::Bool(false));
        assert_eq!(coerce(&c, &json!(5)).unwrap(), SqlValue::Bool(true));
    }

    #[test]
    fn dates_parse_or_pass_through() {
        let c = col("DATE", false);
        assert_eq!(
            coerce(&c, &json!("2024-03-09")).unwrap(),
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
        );
        assert_eq!(coerce(&c, &json!("")).unwrap(), SqlValue::Null(ColumnKind::Date));
        assert_eq!(
            coerce(&c, &json!("09/03/2024")).unwrap(),
            SqlValue::Text("09/03/2024".into())
        );
    }

    #[test]
    fn datetimes_try_each_layout() {
        let c = col("TIMESTAMP", false);
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        for s in ["2024-03-09T14:30:00", "2024-03-09T14:30", "2024-03-09 14:30:00"] {
            assert_eq!(coerce(&c, &json!(s)).unwrap(), SqlValue::DateTime(expected), "{s}");
        }
        assert_eq!(coerce(&c, &json!("")).unwrap(), SqlValue::Null(ColumnKind::DateTime));
        let err = coerce(&c, &json!("yesterday")).unwrap_err();
        assert_eq!(err.column, "field");
    }

    #[test]
    fn text_passes_through() {
        let c = col("VARCHAR(50)", false);
        assert_eq!(coerce(&c, &json!("Chess")).unwrap(), SqlValue::Text("Chess".into()));
        assert_eq!(coerce(&c, &json!(12)).unwrap(), SqlValue::Text("12".into()));
        assert_eq!(coerce(&c, &json!("")).unwrap(), SqlValue::Text(String::new()));
    }

    #[test]
    fn field_modes() {
        let nullable = col("INTEGER", true);
        let required = col("INTEGER", false);

        assert_eq!(
            coerce_field(&nullable, None, FieldMode::Create).unwrap(),
            Some(SqlValue::Null(ColumnKind::Integer))
        );
        assert_eq!(coerce_field(&nullable, None, FieldMode::Update).unwrap(), None);
        assert_eq!(coerce_field(&required, None, FieldMode::Create).unwrap(), None);
        assert_eq!(
            coerce_field(&required, Some(&JsonValue::Null), FieldMode::Update).unwrap(),
            None
        );
        assert_eq!(
            coerce_field(&nullable, Some(&JsonValue::Null), FieldMode::Update).unwrap(),
            Some(SqlValue::Null(ColumnKind::Integer))
        );
        assert_eq!(
            coerce_field(&required, Some(&json!("9")), FieldMode::Update).unwrap(),
            Some(SqlValue::Integer(9))
        );
    }

    #[test]
    fn echo_rendering() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(SqlValue::DateTime(dt).to_json(), json!("2024-01-02T03:04:05"));
        assert_eq!(SqlValue::Null(ColumnKind::Text).to_json(), JsonValue::Null);
        assert_eq!(SqlValue::Bool(false).to_json(), json!(false));
    }
}
