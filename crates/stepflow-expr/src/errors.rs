//! Errores del compilador de expresiones.
//!
//! Sólo existen dos formas: entrada inválida a nivel léxico y error de
//! gramática. Ambas incluyen el texto fuente completo.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ExprError {
    #[error("{}", format_invalid(.src, .detail.as_deref()))] Invalid { src: String, detail: Option<String> },
    #[error("parse expression error: {src}")] Parse { src: String },
}

impl ExprError {
    pub fn invalid(src: &str) -> Self {
        ExprError::Invalid { src: src.to_string(), detail: None }
    }

    pub fn invalid_with(src: &str, detail: impl Into<String>) -> Self {
        ExprError::Invalid { src: src.to_string(), detail: Some(detail.into()) }
    }

    pub fn parse(src: &str) -> Self {
        ExprError::Parse { src: src.to_string() }
    }
}

fn format_invalid(src: &str, detail: Option<&str>) -> String {
    if src.is_empty() {
        return "invalid expression".to_string();
    }
    match detail {
        Some(d) => format!("invalid expression: {src}, {d}"),
        None => format!("invalid expression: {src}"),
    }
}
