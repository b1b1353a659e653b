//! Validadores de input/output/config.
//!
//! Un validador expone `parse(value) -> value | error`: puede normalizar el
//! valor (por ejemplo descartando campos desconocidos) además de validarlo.
//! Si un step no declara validador, el valor pasa sin cambios.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ValidationError;

pub trait Schema {
    fn parse(&self, value: &Value) -> Result<Value, ValidationError>;
}

pub type SharedSchema = Rc<dyn Schema>;

/// Valida deserializando a `T` y re-serializando el resultado.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypedSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedSchema<{}>", std::any::type_name::<T>())
    }
}

impl<T> Schema for TypedSchema<T> where T: DeserializeOwned + Serialize
{
    fn parse(&self, value: &Value) -> Result<Value, ValidationError> {
        let typed: T = serde_json::from_value(value.clone()).map_err(|e| ValidationError::new(e.to_string()))?;
        serde_json::to_value(typed).map_err(|e| ValidationError::new(e.to_string()))
    }
}

/// Validador a partir de una closure.
pub struct FnSchema<F> {
    check: F,
}

impl<F> FnSchema<F> where F: Fn(&Value) -> Result<Value, ValidationError>
{
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

impl<F> Schema for FnSchema<F> where F: Fn(&Value) -> Result<Value, ValidationError>
{
    fn parse(&self, value: &Value) -> Result<Value, ValidationError> {
        (self.check)(value)
    }
}

/// Acepta cualquier valor.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnySchema;

impl Schema for AnySchema {
    fn parse(&self, value: &Value) -> Result<Value, ValidationError> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Email {
        email: String,
    }

    #[test]
    fn typed_schema_normalizes_and_rejects() {
        let schema = TypedSchema::<Email>::new();
        let parsed = schema.parse(&json!({"email": "a@b.c", "extra": 1})).expect("valid payload");
        assert_eq!(parsed, json!({"email": "a@b.c"}));
        assert!(schema.parse(&json!({"mail": "x"})).is_err());
    }

    #[test]
    fn fn_schema_delegates_to_closure() {
        let positive = FnSchema::new(|v: &Value| match v.as_i64() {
                           Some(n) if n > 0 => Ok(v.clone()),
                           _ => Err(ValidationError::new("expected a positive integer")),
                       });
        assert_eq!(positive.parse(&json!(3)), Ok(json!(3)));
        assert_eq!(positive.parse(&json!(-3)).unwrap_err().message, "expected a positive integer");
    }

    #[test]
    fn any_schema_accepts_every_value_unchanged() {
        for value in [json!(null), json!(0), json!("x"), json!([1, {"a": null}]), json!({"nested": {"k": [true]}})] {
            assert_eq!(AnySchema.parse(&value), Ok(value.clone()));
        }
    }
}
