//! Bind JSON values to PostgreSQL parameters with the column's wire type.
//!
//! sqlx caches prepared statements by SQL text, so a parameter must declare the same type
//! on every execution of a statement. The type comes from the placeholder's column, never
//! from the JSON variant that happens to be bound.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

type BoxDynError = Box<dyn std::error::Error + Send + Sync>;

/// Declared parameter type. Dates, timestamps and uuids travel as text and are cast in SQL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindType {
    Int8,
    Float8,
    Bool,
    Text,
}

impl BindType {
    /// From the cast written after the placeholder (`$n::int8`).
    pub fn for_cast(cast: &str) -> Self {
        match cast {
            "int8" => BindType::Int8,
            "float8" => BindType::Float8,
            "bool" => BindType::Bool,
            _ => BindType::Text,
        }
    }

    fn type_info(self) -> PgTypeInfo {
        match self {
            BindType::Int8 => <i64 as Type<Postgres>>::type_info(),
            BindType::Float8 => <f64 as Type<Postgres>>::type_info(),
            BindType::Bool => <bool as Type<Postgres>>::type_info(),
            BindType::Text => <String as Type<Postgres>>::type_info(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PgBindValue {
    pub value: Value,
    pub ty: BindType,
}

impl PgBindValue {
    pub fn new(value: Value, ty: BindType) -> Self {
        PgBindValue { value, ty }
    }

    pub fn as_int8(&self) -> Result<Option<i64>, BoxDynError> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| format!("{} is not a 64-bit integer", n).into()),
            Value::String(s) => s
                .parse()
                .map(Some)
                .map_err(|_| format!("'{}' is not a 64-bit integer", s).into()),
            other => Err(format!("cannot bind {} as int8", other).into()),
        }
    }

    /// Integers are widened.
    pub fn as_float8(&self) -> Result<Option<f64>, BoxDynError> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| format!("{} is not a number", n).into()),
            Value::String(s) => s
                .parse()
                .map(Some)
                .map_err(|_| format!("'{}' is not a number", s).into()),
            other => Err(format!("cannot bind {} as float8", other).into()),
        }
    }

    pub fn as_bool(&self) -> Result<Option<bool>, BoxDynError> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            other => Err(format!("cannot bind {} as bool", other).into()),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match &self.value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(&self, buf: &mut <Postgres as Database>::ArgumentBuffer<'q>) -> Result<IsNull, BoxDynError> {
        match self.ty {
            BindType::Int8 => <Option<i64> as Encode<Postgres>>::encode_by_ref(&self.as_int8()?, buf),
            BindType::Float8 => <Option<f64> as Encode<Postgres>>::encode_by_ref(&self.as_float8()?, buf),
            BindType::Bool => <Option<bool> as Encode<Postgres>>::encode_by_ref(&self.as_bool()?, buf),
            BindType::Text => <Option<String> as Encode<Postgres>>::encode_by_ref(&self.as_text(), buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.ty.type_info())
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}
