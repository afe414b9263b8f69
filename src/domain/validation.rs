use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::reading::REQUIRED_FIELDS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },
    #[error("blank value not allowed in fields: {}", .fields.join(", "))]
    BlankFields { fields: Vec<String> },
}

pub fn validate_payload(payload: &Map<String, Value>) -> Result<(), ValidationError> {
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| !payload.contains_key(**field))
        .map(|field| (*field).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields { fields: missing });
    }

    let blank: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| is_blank(payload.get(**field)))
        .map(|field| (*field).to_string())
        .collect();
    if !blank.is_empty() {
        return Err(ValidationError::BlankFields { fields: blank });
    }

    Ok(())
}

fn is_blank(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(text)) if text.trim().is_empty())
}
