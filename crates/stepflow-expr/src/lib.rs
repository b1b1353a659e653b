//! stepflow-expr: compilador de expresiones para aristas condicionales y de
//! transformación.
//!
//! `compile(src)` tokeniza y parsea una sola vez por texto fuente (caché por
//! hilo) y devuelve un [`Compiled`] reutilizable que se evalúa contra un
//! entorno JSON, típicamente `{"out": <salida del step>}`.
pub mod ast;
pub mod errors;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

pub use errors::ExprError;
pub use value::ExprValue;

use ast::Expr;
use lexer::Token;

/// Expresión compilada. `body == None` corresponde a una fuente que empieza
/// por `]`, que por compatibilidad siempre evalúa a `undefined`.
#[derive(Debug)]
pub struct Compiled {
    source: String,
    body: Option<Expr>,
}

impl Compiled {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evalúa contra un entorno JSON. `None` representa `undefined`.
    pub fn eval(&self, env: &Value) -> Option<Value> {
        self.eval_value(&ExprValue::from_json(env)).into_json()
    }

    pub fn eval_value(&self, env: &ExprValue) -> ExprValue {
        match &self.body {
            Some(expr) => eval::evaluate(expr, env),
            None => ExprValue::Undefined,
        }
    }
}

thread_local! {
    static CACHE: RefCell<HashMap<String, Rc<Compiled>>> = RefCell::new(HashMap::new());
}

/// Compila `src`, reutilizando la versión cacheada si ya existe.
pub fn compile(src: &str) -> Result<Rc<Compiled>, ExprError> {
    if let Some(hit) = CACHE.with(|c| c.borrow().get(src).cloned()) {
        return Ok(hit);
    }
    if src.trim().is_empty() {
        return Err(ExprError::invalid(src));
    }
    let tokens = lexer::tokenize(src)?;
    let body = if matches!(tokens.first(), Some(Token::Punct("]"))) {
        None
    } else {
        Some(parser::parse(src, tokens)?)
    };
    let compiled = Rc::new(Compiled { source: src.to_string(), body });
    CACHE.with(|c| c.borrow_mut().insert(src.to_string(), compiled.clone()));
    Ok(compiled)
}

/// Compila y evalúa en un paso.
pub fn evaluate(src: &str, env: &Value) -> Result<Option<Value>, ExprError> {
    Ok(compile(src)?.eval(env))
}
