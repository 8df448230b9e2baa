//! JSON Schema validation of documents exchanged with the managed system

use crate::error::{AdaptationError, Result};
use jsonschema::JSONSchema;
use serde_json::Value;

/// Validate `document` against `schema`.
///
/// Every violation is reported with the JSON pointer of the offending
/// instance location, e.g. `/restaurant-service: "serviceId" is a required property`.
pub fn validate(document: &Value, schema: &Value) -> Result<()> {
    let compiled =
        JSONSchema::compile(schema).map_err(|e| AdaptationError::InvalidSchema(e.to_string()))?;

    let violations: Vec<String> = match compiled.validate(document) {
        Ok(()) => return Ok(()),
        Err(errors) => errors
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{}: {}", path, error)
                }
            })
            .collect(),
    };

    Err(AdaptationError::SchemaViolation { violations })
}
