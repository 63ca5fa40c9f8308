//! Mutation planning: operation choice and validation of operator input.
//!
//! Nothing here touches the store. A value is validated by applying it to a
//! scratch copy of every item, so the same conversion rules used by the batch
//! run decide whether the plan is accepted.

use strum::{Display, EnumString};

use docmaint_core::{Record, ValueCoercion};

use crate::error::ValidationError;
use crate::subsystems::schema::FieldSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Operation {
    #[strum(serialize = "UPDATE")]
    Update,
    #[strum(serialize = "DELETE")]
    Delete,
}

pub fn parse_operation(input: &str) -> Option<Operation> {
    input.trim().parse().ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationPlan {
    Delete,
    UpdateField { field: String, raw_value: String },
}

pub fn validate_field(fields: &FieldSet, name: &str) -> Result<String, ValidationError> {
    if fields.contains(name) {
        Ok(name.to_string())
    } else {
        Err(ValidationError::UnknownField(name.to_string()))
    }
}

pub fn validate_value<R: Record>(
    items: &[R],
    field: &str,
    raw: &str,
    coercion: ValueCoercion,
) -> Result<(), ValidationError> {
    for item in items {
        let mut scratch = item.clone();
        scratch
            .set_field(field, raw, coercion)
            .map_err(|e| ValidationError::InvalidValue {
                field: field.to_string(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}
