use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString, VariantNames};

use crate::error::FieldError;
use crate::record::{
    deserialize_timestamp, invalid, parse_bool, parse_float, parse_timestamp, FieldKind, Record,
    ValueCoercion,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString, VariantNames)]
#[strum(ascii_case_insensitive)]
pub enum UsageStatus {
    #[default]
    Pending,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString, VariantNames)]
#[strum(ascii_case_insensitive)]
pub enum UsageReferenceType {
    #[default]
    Assistant,
    Prompt,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString, VariantNames)]
#[strum(ascii_case_insensitive)]
pub enum UsageSourceType {
    #[default]
    SessionItem,
    Session,
}

/// Members are written by name but read by name or by ordinal, since older
/// writers stored the numeric discriminant (declaration order from 0).
fn deserialize_member<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + VariantNames,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Name(String),
        Ordinal(u64),
    }

    let name = match Stored::deserialize(deserializer)? {
        Stored::Name(name) => name,
        Stored::Ordinal(ordinal) => usize::try_from(ordinal)
            .ok()
            .and_then(|i| T::VARIANTS.get(i))
            .map(|name| name.to_string())
            .ok_or_else(|| {
                <D::Error as de::Error>::custom(format!(
                    "ordinal {} is not one of {:?}",
                    ordinal,
                    T::VARIANTS
                ))
            })?,
    };
    name.parse().map_err(|_| {
        de::Error::custom(format!("'{}' is not one of {:?}", name, T::VARIANTS))
    })
}

impl<'de> Deserialize<'de> for UsageStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_member(deserializer)
    }
}

impl<'de> Deserialize<'de> for UsageReferenceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_member(deserializer)
    }
}

impl<'de> Deserialize<'de> for UsageSourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_member(deserializer)
    }
}

/// Metered usage entry as stored in the `UsageRecords` container.
///
/// Text fields are optional: unset strings are stored as `null` and written
/// back as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageRecord {
    pub business_key: Option<String>,
    pub reference_id: Option<String>,
    pub reference_type: UsageReferenceType,
    pub source_id: Option<String>,
    pub source_type: UsageSourceType,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_on: DateTime<Utc>,
    pub created_by: Option<String>,
    pub id: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub metric_id: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub modified_on: DateTime<Utc>,
    pub physical_key: Option<String>,
    pub status: UsageStatus,
    pub client_id: Option<String>,
    pub value: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Field capability table
// ============================================================================

type Getter = fn(&UsageRecord) -> Value;
type Setter = fn(&mut UsageRecord, &str) -> Result<(), FieldError>;

/// One field: its stored name and accessors.
pub struct FieldAccess {
    pub name: &'static str,
    pub get: Getter,
    pub set: Setter,
}

fn parse_member<T: FromStr>(
    field: &str,
    members: &'static [&'static str],
    raw: &str,
) -> Result<T, FieldError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| invalid(field, FieldKind::Enum(members).describe(), raw))
}

fn ts(v: &DateTime<Utc>) -> Value {
    Value::String(v.to_rfc3339())
}

fn text(v: &Option<String>) -> Value {
    Value::from(v.clone())
}

/// Declaration order matches the stored document layout.
pub static USAGE_RECORD_FIELDS: &[FieldAccess] = &[
    FieldAccess {
        name: "businessKey",
        get: |r| text(&r.business_key),
        set: |r, v| {
            r.business_key = Some(v.to_string());
            Ok(())
        },
    },
    FieldAccess {
        name: "referenceId",
        get: |r| text(&r.reference_id),
        set: |r, v| {
            r.reference_id = Some(v.to_string());
            Ok(())
        },
    },
    FieldAccess {
        name: "referenceType",
        get: |r| Value::String(r.reference_type.to_string()),
        set: |r, v| {
            r.reference_type = parse_member("referenceType", UsageReferenceType::VARIANTS, v)?;
            Ok(())
        },
    },
    FieldAccess {
        name: "sourceId",
        get: |r| text(&r.source_id),
        set: |r, v| {
            r.source_id = Some(v.to_string());
            Ok(())
        },
    },
    FieldAccess {
        name: "sourceType",
        get: |r| Value::String(r.source_type.to_string()),
        set: |r, v| {
            r.source_type = parse_member("sourceType", UsageSourceType::VARIANTS, v)?;
            Ok(())
        },
    },
    FieldAccess {
        name: "createdOn",
        get: |r| ts(&r.created_on),
        set: |r, v| {
            r.created_on = parse_timestamp("createdOn", v)?;
            Ok(())
        },
    },
    FieldAccess {
        name: "createdBy",
        get: |r| text(&r.created_by),
        set: |r, v| {
            r.created_by = Some(v.to_string());
            Ok(())
        },
    },
    FieldAccess {
        name: "id",
        get: |r| Value::String(r.id.clone()),
        set: |_, _| Err(FieldError::IdentityField),
    },
    FieldAccess {
        name: "isActive",
        get: |r| Value::Bool(r.is_active),
        set: |r, v| {
            r.is_active = parse_bool("isActive", v)?;
            Ok(())
        },
    },
    FieldAccess {
        name: "isDeleted",
        get: |r| Value::Bool(r.is_deleted),
        set: |r, v| {
            r.is_deleted = parse_bool("isDeleted", v)?;
            Ok(())
        },
    },
    FieldAccess {
        name: "metricId",
        get: |r| text(&r.metric_id),
        set: |r, v| {
            r.metric_id = Some(v.to_string());
            Ok(())
        },
    },
    FieldAccess {
        name: "modifiedOn",
        get: |r| ts(&r.modified_on),
        set: |r, v| {
            r.modified_on = parse_timestamp("modifiedOn", v)?;
            Ok(())
        },
    },
    FieldAccess {
        name: "physicalKey",
        get: |r| text(&r.physical_key),
        set: |r, v| {
            r.physical_key = Some(v.to_string());
            Ok(())
        },
    },
    FieldAccess {
        name: "status",
        get: |r| Value::String(r.status.to_string()),
        set: |r, v| {
            r.status = parse_member("status", UsageStatus::VARIANTS, v)?;
            Ok(())
        },
    },
    FieldAccess {
        name: "clientId",
        get: |r| text(&r.client_id),
        set: |r, v| {
            r.client_id = Some(v.to_string());
            Ok(())
        },
    },
    FieldAccess {
        name: "value",
        get: |r| serde_json::Number::from_f64(r.value).map_or(Value::Null, Value::Number),
        set: |r, v| {
            r.value = parse_float("value", v)?;
            Ok(())
        },
    },
    FieldAccess {
        name: "timestamp",
        get: |r| ts(&r.timestamp),
        set: |r, v| {
            r.timestamp = parse_timestamp("timestamp", v)?;
            Ok(())
        },
    },
];

impl UsageRecord {
    pub fn field(name: &str) -> Option<&'static FieldAccess> {
        USAGE_RECORD_FIELDS.iter().find(|f| f.name == name)
    }
}

impl Record for UsageRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn declared_fields() -> Option<Vec<&'static str>> {
        Some(USAGE_RECORD_FIELDS.iter().map(|f| f.name).collect())
    }

    fn present_fields(&self) -> Vec<String> {
        USAGE_RECORD_FIELDS.iter().map(|f| f.name.to_string()).collect()
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        Self::field(name).map(|f| (f.get)(self))
    }

    fn set_field(
        &mut self,
        name: &str,
        raw: &str,
        _coercion: ValueCoercion,
    ) -> Result<(), FieldError> {
        let field = Self::field(name).ok_or_else(|| FieldError::UnknownField(name.to_string()))?;
        (field.set)(self, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> UsageRecord {
        serde_json::from_value(json!({
            "id": "rec-1",
            "businessKey": "bk",
            "referenceType": "Prompt",
            "sourceType": "Session",
            "status": "Pending",
            "isActive": true,
            "value": 12.5,
            "createdOn": "2024-01-02T03:04:05Z",
            "_rid": "abc==",
            "_etag": "\"0000\""
        }))
        .expect("usage record")
    }

    #[test]
    fn test_decodes_camel_case_and_ignores_system_properties() {
        let record = sample();
        assert_eq!(record.id, "rec-1");
        assert_eq!(record.reference_type, UsageReferenceType::Prompt);
        assert_eq!(record.source_type, UsageSourceType::Session);
        assert_eq!(record.status, UsageStatus::Pending);
        assert!(record.is_active);
        assert_eq!(record.value, 12.5);
        assert_eq!(record.client_id, None, "missing fields default");

        let stored = serde_json::to_value(&record).unwrap();
        assert_eq!(stored["status"], json!("Pending"));
        assert_eq!(stored["businessKey"], json!("bk"));
        assert!(stored.get("_rid").is_none());
    }

    #[test]
    fn test_field_table_covers_every_stored_property() {
        let stored = serde_json::to_value(UsageRecord::default()).unwrap();
        let stored_keys: Vec<&str> = stored
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        let declared = UsageRecord::declared_fields().unwrap();

        assert_eq!(declared.len(), 17);
        assert_eq!(stored_keys, declared);
        assert!(declared.contains(&"id"));
    }

    #[test]
    fn test_set_status_by_member_name() {
        let mut record = sample();
        record
            .set_field("status", "completed", ValueCoercion::Verbatim)
            .unwrap();
        assert_eq!(record.status, UsageStatus::Completed);
        assert_eq!(record.get_field("status"), Some(json!("Completed")));
    }

    #[test]
    fn test_set_rejects_unconvertible_values() {
        let mut record = sample();

        let err = record
            .set_field("status", "Done", ValueCoercion::Verbatim)
            .unwrap_err();
        assert_eq!(
            err,
            FieldError::InvalidValue {
                field: "status".to_string(),
                expected: "one of [Pending, Completed]".to_string(),
                value: "Done".to_string(),
            }
        );
        assert!(record.set_field("value", "lots", ValueCoercion::Verbatim).is_err());
        assert!(record.set_field("isActive", "1", ValueCoercion::Verbatim).is_err());
        assert!(record
            .set_field("modifiedOn", "not-a-date", ValueCoercion::Verbatim)
            .is_err());
        assert_eq!(record, sample(), "failed assignments leave the record untouched");
    }

    #[test]
    fn test_set_typed_values() {
        let mut record = sample();
        record.set_field("value", "3.75", ValueCoercion::Verbatim).unwrap();
        record.set_field("isDeleted", "True", ValueCoercion::Verbatim).unwrap();
        record
            .set_field("modifiedOn", "2024-05-06", ValueCoercion::Verbatim)
            .unwrap();
        record
            .set_field("referenceType", "agent", ValueCoercion::Verbatim)
            .unwrap();

        assert_eq!(record.value, 3.75);
        assert!(record.is_deleted);
        assert_eq!(record.get_field("modifiedOn"), Some(json!("2024-05-06T00:00:00+00:00")));
        assert_eq!(record.reference_type, UsageReferenceType::Agent);
    }

    #[test]
    fn test_unknown_and_identity_fields() {
        let mut record = sample();
        assert_eq!(
            record.set_field("statuss", "Completed", ValueCoercion::Verbatim),
            Err(FieldError::UnknownField("statuss".to_string()))
        );
        assert_eq!(
            record.set_field("id", "rec-2", ValueCoercion::Verbatim),
            Err(FieldError::IdentityField)
        );
        assert_eq!(record.id, "rec-1");
        assert_eq!(record.get_field("Status"), None, "names are case-sensitive");
    }

    fn legacy_document() -> Value {
        json!({
            "businessKey": "bk",
            "referenceId": null,
            "referenceType": 2,
            "sourceId": null,
            "sourceType": 0,
            "createdOn": "2024-01-01T00:00:00",
            "createdBy": null,
            "id": "rec-9",
            "isActive": true,
            "isDeleted": false,
            "metricId": null,
            "modifiedOn": "2024-01-02T08:30:00.1234567",
            "physicalKey": null,
            "status": 0,
            "clientId": null,
            "value": 0.0,
            "timestamp": "0001-01-01T00:00:00"
        })
    }

    #[test]
    fn test_decodes_nulls_naive_timestamps_and_ordinals() {
        let record: UsageRecord = serde_json::from_value(legacy_document()).unwrap();

        assert_eq!(record.created_by, None);
        assert_eq!(record.business_key.as_deref(), Some("bk"));
        assert_eq!(record.reference_type, UsageReferenceType::Agent);
        assert_eq!(record.source_type, UsageSourceType::SessionItem);
        assert_eq!(record.status, UsageStatus::Pending);
        assert_eq!(record.created_on.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(record.modified_on.timestamp_subsec_nanos(), 123_456_700);
    }

    #[test]
    fn test_nulls_survive_and_enums_are_written_by_name() {
        let record: UsageRecord = serde_json::from_value(legacy_document()).unwrap();
        let stored = serde_json::to_value(&record).unwrap();

        assert_eq!(stored["createdBy"], Value::Null);
        assert_eq!(stored["clientId"], Value::Null);
        assert_eq!(stored["status"], json!("Pending"));
        assert_eq!(stored["referenceType"], json!("Agent"));
        assert_eq!(record.get_field("metricId"), Some(Value::Null));
    }

    #[test]
    fn test_unknown_ordinals_and_names_are_rejected() {
        let mut doc = legacy_document();
        doc["status"] = json!(7);
        assert!(serde_json::from_value::<UsageRecord>(doc.clone()).is_err());

        doc["status"] = json!("Archived");
        assert!(serde_json::from_value::<UsageRecord>(doc.clone()).is_err());

        doc["status"] = json!("completed");
        let record: UsageRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(record.status, UsageStatus::Completed);
    }
}
