//! Record shapes the maintenance workflow can operate on.
//!
//! A record is anything with an identity field and a set of named fields that
//! can be assigned from operator text. Two implementations exist:
//! - [`UsageRecord`](crate::models::usage_record::UsageRecord), a fixed shape
//!   backed by a static field capability table;
//! - [`OpenRecord`], an ordered JSON map with no schema beyond `id`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FieldError;

/// How raw operator text becomes a value on an open record.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueCoercion {
    /// Store the text as a JSON string, whatever the field held before.
    #[default]
    Verbatim,
    /// Parse the text into the JSON type the field currently holds.
    PreserveType,
}

/// Identity field. It doubles as the partition key, so it is never updated.
pub const ID_FIELD: &str = "id";

/// Value type of a declared field, as named in rejection messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Float,
    Timestamp,
    Enum(&'static [&'static str]),
}

impl FieldKind {
    pub fn describe(&self) -> String {
        match self {
            FieldKind::Bool => "boolean (true/false)".to_string(),
            FieldKind::Float => "number".to_string(),
            FieldKind::Timestamp => "timestamp".to_string(),
            FieldKind::Enum(members) => format!("one of [{}]", members.join(", ")),
        }
    }
}

pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Identity field; also the partition key.
    fn id(&self) -> &str;

    /// Fixed field list for typed shapes, `None` for schemaless ones.
    fn declared_fields() -> Option<Vec<&'static str>>;

    /// Field names present on this particular record, in document order.
    fn present_fields(&self) -> Vec<String>;

    fn get_field(&self, name: &str) -> Option<Value>;

    /// Assign `raw` to `name`, converting it as the shape requires.
    /// `coercion` only affects shapes without declared field types.
    fn set_field(
        &mut self,
        name: &str,
        raw: &str,
        coercion: ValueCoercion,
    ) -> Result<(), FieldError>;
}

pub(crate) fn invalid(field: &str, expected: impl Into<String>, value: &str) -> FieldError {
    FieldError::InvalidValue {
        field: field.to_string(),
        expected: expected.into(),
        value: value.to_string(),
    }
}

pub(crate) fn parse_bool(field: &str, raw: &str) -> Result<bool, FieldError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(field, FieldKind::Bool.describe(), raw)),
    }
}

pub(crate) fn parse_float(field: &str, raw: &str) -> Result<f64, FieldError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(field, FieldKind::Float.describe(), raw))
}

/// RFC 3339, or a naive `YYYY-MM-DD[T| ]HH:MM:SS[.fff]` / `YYYY-MM-DD` taken as UTC.
fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, FieldError> {
    parse_datetime(raw.trim()).ok_or_else(|| invalid(field, FieldKind::Timestamp.describe(), raw))
}

/// Stored timestamps may lack an offset (writers that serialize local
/// `DateTime` kinds); those are read as UTC. `null` reads as the default.
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(DateTime::<Utc>::default()),
        Some(raw) => parse_datetime(raw.trim())
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw))),
    }
}

// ============================================================================
// OpenRecord
// ============================================================================

/// Schemaless document: an ordered map that must carry a string `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpenRecord(Map<String, Value>);

impl OpenRecord {
    /// Parse `raw` into the JSON type `current` holds.
    fn coerce_like(name: &str, current: Option<&Value>, raw: &str) -> Result<Value, FieldError> {
        match current {
            Some(Value::Bool(_)) => parse_bool(name, raw).map(Value::Bool),
            Some(Value::Number(n)) => {
                if n.is_f64() {
                    let v = parse_float(name, raw)?;
                    serde_json::Number::from_f64(v)
                        .map(Value::Number)
                        .ok_or_else(|| invalid(name, "number", raw))
                } else {
                    raw.trim()
                        .parse::<i64>()
                        .map(Value::from)
                        .map_err(|_| invalid(name, "integer", raw))
                }
            }
            Some(Value::Array(_)) => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Array(_)) => Ok(v),
                _ => Err(invalid(name, "JSON array", raw)),
            },
            Some(Value::Object(_)) => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Object(_)) => Ok(v),
                _ => Err(invalid(name, "JSON object", raw)),
            },
            Some(Value::String(_)) | Some(Value::Null) | None => Ok(Value::String(raw.to_string())),
        }
    }
}

impl Record for OpenRecord {
    fn id(&self) -> &str {
        self.0.get(ID_FIELD).and_then(Value::as_str).unwrap_or("")
    }

    fn declared_fields() -> Option<Vec<&'static str>> {
        None
    }

    fn present_fields(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }

    fn set_field(
        &mut self,
        name: &str,
        raw: &str,
        coercion: ValueCoercion,
    ) -> Result<(), FieldError> {
        if name == ID_FIELD {
            return Err(FieldError::IdentityField);
        }
        let value = match coercion {
            ValueCoercion::Verbatim => Value::String(raw.to_string()),
            ValueCoercion::PreserveType => Self::coerce_like(name, self.0.get(name), raw)?,
        };
        self.0.insert(name.to_string(), value);
        Ok(())
    }
}
