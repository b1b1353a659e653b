//! Evaluador del AST sobre un entorno de valores.

use indexmap::IndexMap;

use crate::ast::{BinaryOp, Expr, LogicalOp, ObjectEntry, Property, UnaryOp};
use crate::value::ExprValue;

pub fn evaluate(expr: &Expr, env: &ExprValue) -> ExprValue {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Ident(name) => match env {
            ExprValue::Object(map) => map.get(name).cloned().unwrap_or(ExprValue::Null),
            _ => ExprValue::Null,
        },
        Expr::Unary { op, arg } => eval_unary(*op, evaluate(arg, env)),
        Expr::Binary { op, left, right } => eval_binary(*op, evaluate(left, env), evaluate(right, env)),
        Expr::Logical { op, left, right } => eval_logical(*op, left, right, env),
        Expr::Conditional { test, consequent, alternate } => {
            if evaluate(test, env).truthy() {
                evaluate(consequent, env)
            } else {
                evaluate(alternate, env)
            }
        }
        Expr::Member { object, property, optional } => {
            let obj = evaluate(object, env);
            if obj.is_nullish() {
                return if *optional { ExprValue::Undefined } else { ExprValue::Null };
            }
            let key = property_key(property, env);
            get_property(&obj, &key)
        }
        Expr::Call { callee, optional, .. } => eval_call(callee, *optional, env),
        Expr::Array(items) => ExprValue::Array(items.iter().map(|e| evaluate(e, env)).collect()),
        Expr::Object(entries) => {
            let mut out = IndexMap::new();
            for entry in entries {
                match entry {
                    ObjectEntry::Field(key, value) => {
                        out.insert(key.clone(), evaluate(value, env));
                    }
                    ObjectEntry::Spread(source) => match evaluate(source, env) {
                        ExprValue::Object(map) => out.extend(map),
                        ExprValue::Array(items) => {
                            out.extend(items.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)));
                        }
                        _ => {}
                    },
                }
            }
            ExprValue::Object(out)
        }
        Expr::Template { quasis, exprs } => {
            let mut out = quasis.first().cloned().unwrap_or_default();
            for (i, e) in exprs.iter().enumerate() {
                out.push_str(&evaluate(e, env).to_display_string());
                if let Some(q) = quasis.get(i + 1) {
                    out.push_str(q);
                }
            }
            ExprValue::Str(out)
        }
    }
}

fn property_key(property: &Property, env: &ExprValue) -> String {
    match property {
        Property::Static(name) => name.clone(),
        Property::Computed(expr) => evaluate(expr, env).to_display_string(),
    }
}

fn get_property(obj: &ExprValue, key: &str) -> ExprValue {
    match obj {
        ExprValue::Object(map) => map.get(key).cloned().unwrap_or(ExprValue::Undefined),
        ExprValue::Array(items) => {
            if key == "length" {
                return ExprValue::Number(items.len() as f64);
            }
            array_index(key).and_then(|i| items.get(i).cloned()).unwrap_or(ExprValue::Undefined)
        }
        ExprValue::Str(s) => {
            if key == "length" {
                return ExprValue::Number(s.encode_utf16().count() as f64);
            }
            array_index(key).and_then(|i| s.chars().nth(i))
                            .map(|c| ExprValue::Str(c.to_string()))
                            .unwrap_or(ExprValue::Undefined)
        }
        _ => ExprValue::Undefined,
    }
}

fn array_index(key: &str) -> Option<usize> {
    let idx = key.parse::<usize>().ok()?;
    (idx.to_string() == key).then_some(idx)
}

/// Los entornos son datos JSON: no hay nada invocable. Una llamada produce
/// `null`, salvo el encadenamiento opcional sobre un callee nulo, que
/// produce `undefined`.
fn eval_call(callee: &Expr, optional: bool, env: &ExprValue) -> ExprValue {
    let target = match callee {
        Expr::Member { object, property, optional: member_optional } => {
            let obj = evaluate(object, env);
            if obj.is_nullish() {
                return if *member_optional { ExprValue::Undefined } else { ExprValue::Null };
            }
            get_property(&obj, &property_key(property, env))
        }
        other => evaluate(other, env),
    };
    if optional && target.is_nullish() {
        ExprValue::Undefined
    } else {
        ExprValue::Null
    }
}

fn eval_unary(op: UnaryOp, value: ExprValue) -> ExprValue {
    match op {
        UnaryOp::Not => ExprValue::Bool(!value.truthy()),
        // identidad: `+"1"` conserva la cadena
        UnaryOp::Plus => value,
        UnaryOp::Minus => ExprValue::Number(-value.to_number()),
    }
}

fn eval_binary(op: BinaryOp, l: ExprValue, r: ExprValue) -> ExprValue {
    use ExprValue::{Bool, Number, Str};
    match op {
        BinaryOp::Add => {
            let (lp, rp) = (l.to_primitive(), r.to_primitive());
            if matches!(lp, Str(_)) || matches!(rp, Str(_)) {
                Str(lp.to_display_string() + &rp.to_display_string())
            } else {
                Number(lp.to_number() + rp.to_number())
            }
        }
        BinaryOp::Sub => Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => Number(l.to_number() * r.to_number()),
        BinaryOp::Div => Number(l.to_number() / r.to_number()),
        BinaryOp::Rem => Number(l.to_number() % r.to_number()),
        BinaryOp::Gt => Bool(compare(&l, &r).is_some_and(|o| o.is_gt())),
        BinaryOp::Lt => Bool(compare(&l, &r).is_some_and(|o| o.is_lt())),
        BinaryOp::Ge => Bool(compare(&l, &r).is_some_and(|o| o.is_ge())),
        BinaryOp::Le => Bool(compare(&l, &r).is_some_and(|o| o.is_le())),
        BinaryOp::LooseEq => Bool(l.loose_eq(&r)),
        BinaryOp::LooseNe => Bool(!l.loose_eq(&r)),
        BinaryOp::StrictEq => Bool(l.strict_eq(&r)),
        BinaryOp::StrictNe => Bool(!l.strict_eq(&r)),
    }
}

/// Comparación relacional: cadenas contra cadenas se ordenan
/// lexicográficamente; el resto como números (`None` si hay NaN).
fn compare(l: &ExprValue, r: &ExprValue) -> Option<std::cmp::Ordering> {
    match (l.to_primitive(), r.to_primitive()) {
        (ExprValue::Str(a), ExprValue::Str(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

/// `&&` produce `false` o el valor derecho; `||` produce `true` o el valor
/// derecho.
fn eval_logical(op: LogicalOp, left: &Expr, right: &Expr, env: &ExprValue) -> ExprValue {
    match op {
        LogicalOp::And => {
            if evaluate(left, env).truthy() {
                evaluate(right, env)
            } else {
                ExprValue::Bool(false)
            }
        }
        LogicalOp::Or => {
            if evaluate(left, env).truthy() {
                ExprValue::Bool(true)
            } else {
                evaluate(right, env)
            }
        }
        LogicalOp::Coalesce => {
            let value = evaluate(left, env);
            if value.is_nullish() {
                evaluate(right, env)
            } else {
                value
            }
        }
    }
}
