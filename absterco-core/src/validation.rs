use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::errors::AppError;

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "email" => Some("must be a valid email"),
        "length" => Some("has invalid length"),
        "range" => Some("is out of range"),
        "url" => Some("must be a valid URL"),
        "blank" => Some("must not be blank"),
        _ => None,
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn push_errors(out: &mut Map<String, Value>, prefix: &str, errs: &ValidationErrors) {
    for (field, kind) in errs.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let key = join_path(prefix, field);
                let entry = out
                    .entry(key)
                    .or_insert_with(|| Value::Array(Vec::new()));
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(|m| m.to_string()))
                        .unwrap_or_else(|| e.code.to_string());
                    if let Value::Array(list) = entry {
                        list.push(Value::String(msg));
                    }
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                push_errors(out, &join_path(prefix, field), nested.as_ref());
            }
            ValidationErrorsKind::List(items) => {
                let base = join_path(prefix, field);
                for (idx, nested) in items {
                    push_errors(out, &format!("{base}[{idx}]"), nested.as_ref());
                }
            }
        }
    }
}

/// Flatten `validator` errors into `{ "path.field": ["message"] }`.
pub fn flatten_errors(errs: &ValidationErrors) -> Value {
    let mut out = Map::new();
    push_errors(&mut out, "", errs);
    Value::Object(out)
}

/// Run `validator` on a value; failures become a `Validation` error.
pub fn validate<T: Validate>(value: &T, message: &str) -> anyhow::Result<()> {
    value.validate().map_err(|e| {
        AppError::validation(message)
            .with_errors(flatten_errors(&e))
            .into_anyhow()
    })
}

/// `validator` custom rule: rejects empty or whitespace-only strings.
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}
