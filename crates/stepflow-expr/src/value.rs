//! Valores en tiempo de evaluación y reglas de coerción.
//!
//! El entorno llega como `serde_json::Value`, pero durante la evaluación se
//! necesita distinguir `undefined` de `null` y operar con números `f64`, por
//! lo que se usa un tipo propio. Las coerciones siguen las reglas habituales
//! de los lenguajes de scripting débilmente tipados (`null + 1 == 1`,
//! `"a" + 1 == "a1"`, igualdad laxa, etc.).

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<ExprValue>),
    Object(IndexMap<String, ExprValue>),
}

impl ExprValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ExprValue::Null,
            Value::Bool(b) => ExprValue::Bool(*b),
            Value::Number(n) => ExprValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => ExprValue::Str(s.clone()),
            Value::Array(items) => ExprValue::Array(items.iter().map(ExprValue::from_json).collect()),
            Value::Object(map) => {
                ExprValue::Object(map.iter().map(|(k, v)| (k.clone(), ExprValue::from_json(v))).collect())
            }
        }
    }

    /// Convierte a JSON. `undefined` en la raíz produce `None`; dentro de un
    /// objeto la clave se omite y dentro de un array se vuelve `null`.
    pub fn into_json(self) -> Option<Value> {
        match self {
            ExprValue::Undefined => None,
            ExprValue::Null => Some(Value::Null),
            ExprValue::Bool(b) => Some(Value::Bool(b)),
            ExprValue::Number(n) => Some(number_to_json(n)),
            ExprValue::Str(s) => Some(Value::String(s)),
            ExprValue::Array(items) => {
                Some(Value::Array(items.into_iter().map(|v| v.into_json().unwrap_or(Value::Null)).collect()))
            }
            ExprValue::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    if let Some(json) = v.into_json() {
                        out.insert(k, json);
                    }
                }
                Some(Value::Object(out))
            }
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, ExprValue::Undefined | ExprValue::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            ExprValue::Undefined | ExprValue::Null => false,
            ExprValue::Bool(b) => *b,
            ExprValue::Number(n) => *n != 0.0 && !n.is_nan(),
            ExprValue::Str(s) => !s.is_empty(),
            ExprValue::Array(_) | ExprValue::Object(_) => true,
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, ExprValue::Array(_) | ExprValue::Object(_))
    }

    /// Arrays y objetos se reducen a su representación textual.
    pub fn to_primitive(&self) -> ExprValue {
        if self.is_compound() {
            ExprValue::Str(self.to_display_string())
        } else {
            self.clone()
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            ExprValue::Undefined => f64::NAN,
            ExprValue::Null => 0.0,
            ExprValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            ExprValue::Number(n) => *n,
            ExprValue::Str(s) => string_to_number(s),
            ExprValue::Array(_) | ExprValue::Object(_) => self.to_primitive().to_number(),
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            ExprValue::Undefined => "undefined".to_string(),
            ExprValue::Null => "null".to_string(),
            ExprValue::Bool(b) => b.to_string(),
            ExprValue::Number(n) => format_number(*n),
            ExprValue::Str(s) => s.clone(),
            ExprValue::Array(items) => items.iter()
                                            .map(|v| if v.is_nullish() { String::new() } else { v.to_display_string() })
                                            .collect::<Vec<_>>()
                                            .join(","),
            ExprValue::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Igualdad estricta. Arrays y objetos se comparan por valor.
    pub fn strict_eq(&self, other: &ExprValue) -> bool {
        match (self, other) {
            (ExprValue::Number(a), ExprValue::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// Igualdad laxa (`==`).
    pub fn loose_eq(&self, other: &ExprValue) -> bool {
        use ExprValue::*;
        match (self, other) {
            (Undefined | Null, Undefined | Null) => true,
            (Undefined | Null, _) | (_, Undefined | Null) => false,
            (Number(_), Number(_)) | (Str(_), Str(_)) | (Bool(_), Bool(_)) => self.strict_eq(other),
            (Number(a), Str(_)) => *a == other.to_number(),
            (Str(_), Number(b)) => self.to_number() == *b,
            (Bool(_), _) => Number(self.to_number()).loose_eq(other),
            (_, Bool(_)) => self.loose_eq(&Number(other.to_number())),
            (Array(_) | Object(_), Array(_) | Object(_)) => self.strict_eq(other),
            (Array(_) | Object(_), _) => self.to_primitive().loose_eq(other),
            (_, Array(_) | Object(_)) => self.loose_eq(&other.to_primitive()),
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => {
            // `f64::from_str` acepta "inf"/"nan", que aquí no son números
            if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
                return f64::NAN;
            }
            trimmed.parse::<f64>().unwrap_or(f64::NAN)
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

fn number_to_json(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_numbers_round_trip_as_integers() {
        let v = ExprValue::from_json(&json!({"a": 42, "b": 1.5}));
        assert_eq!(v.into_json(), Some(json!({"a": 42, "b": 1.5})));
    }

    #[test]
    fn undefined_is_dropped_from_objects_and_nulled_in_arrays() {
        let mut map = IndexMap::new();
        map.insert("x".to_string(), ExprValue::Undefined);
        map.insert("y".to_string(), ExprValue::Array(vec![ExprValue::Undefined]));
        assert_eq!(ExprValue::Object(map).into_json(), Some(json!({"y": [null]})));
        assert_eq!(ExprValue::Undefined.into_json(), None);
    }

    #[test]
    fn loose_equality_coerces_like_scripting_languages() {
        assert!(ExprValue::Number(1.0).loose_eq(&ExprValue::Str("1".into())));
        assert!(ExprValue::Bool(true).loose_eq(&ExprValue::Number(1.0)));
        assert!(ExprValue::Null.loose_eq(&ExprValue::Undefined));
        assert!(!ExprValue::Null.loose_eq(&ExprValue::Number(0.0)));
        assert!(!ExprValue::Number(f64::NAN).loose_eq(&ExprValue::Number(f64::NAN)));
    }

    #[test]
    fn string_conversion_of_numbers() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(string_to_number(" 12 "), 12.0);
        assert!(string_to_number("abc").is_nan());
        assert!(string_to_number("inf").is_nan());
    }
}
