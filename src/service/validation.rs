//! Request validation from the entity's field types and catalog rules.

use crate::config::{FieldType, ResolvedEntity, ValidationRule};
use crate::error::AppError;
use crate::gateway::Record;
use regex::Regex;
use serde_json::Value;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body: every non-nullable (or `required`) field must be present.
    pub fn validate(body: &Record, entity: &ResolvedEntity) -> Result<(), AppError> {
        if !entity.pk_type.storage_assigned() {
            match body.get(&entity.pk_column) {
                Some(Value::String(s)) if !s.trim().is_empty() => {}
                _ => return Err(AppError::Validation(format!("{} is required", entity.pk_column))),
            }
        }
        let no_rule = ValidationRule::default();
        for c in entity.writable_columns() {
            let rule = entity.validation.get(&c.name).unwrap_or(&no_rule);
            let val = body.get(&c.name);
            let required = rule.required.unwrap_or(!c.nullable);
            if required && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", c.name)));
            }
            if let Some(v) = val {
                validate_field(&c.name, c.field_type, c.nullable, v, rule, entity.patterns.get(&c.name))?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PATCH). Required is not enforced for missing fields.
    pub fn validate_partial(body: &Record, entity: &ResolvedEntity) -> Result<(), AppError> {
        let no_rule = ValidationRule::default();
        for (col, v) in body {
            let Some(c) = entity.column(col).filter(|c| c.writable()) else {
                continue;
            };
            let rule = entity.validation.get(col).unwrap_or(&no_rule);
            validate_field(col, c.field_type, c.nullable, v, rule, entity.patterns.get(col))?;
        }
        Ok(())
    }
}

fn validate_field(
    col: &str,
    ty: FieldType,
    nullable: bool,
    v: &Value,
    rule: &ValidationRule,
    pattern: Option<&Regex>,
) -> Result<(), AppError> {
    if v.is_null() {
        if nullable {
            return Ok(());
        }
        return Err(AppError::Validation(format!("{} must not be null", col)));
    }
    validate_type(col, ty, v)?;
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.trim().chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(re) = pattern {
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn validate_type(col: &str, ty: FieldType, v: &Value) -> Result<(), AppError> {
    let ok = match ty {
        FieldType::Text => v.is_string(),
        FieldType::Integer => v.is_i64(),
        FieldType::Float => v.is_number(),
        FieldType::Boolean => v.is_boolean(),
        FieldType::Date => v.as_str().is_some_and(|s| parse_date(s).is_some()),
        FieldType::Datetime => v.as_str().is_some_and(|s| parse_datetime(s).is_some()),
    };
    if ok {
        return Ok(());
    }
    let expected = match ty {
        FieldType::Text => "a string",
        FieldType::Integer => "an integer",
        FieldType::Float => "a number",
        FieldType::Boolean => "a boolean",
        FieldType::Date => "a date (YYYY-MM-DD)",
        FieldType::Datetime => "a datetime (YYYY-MM-DD HH:MM:SS)",
    };
    Err(AppError::Validation(format!("{} must be {}", col, expected)))
}

fn parse_date(s: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| chrono::DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc()))
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(AppError::Validation(format!("{} must be a valid email", col)));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(AppError::Validation(format!("{} must be a valid UUID", col)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}
