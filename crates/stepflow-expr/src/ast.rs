//! Árbol sintáctico de expresiones.

use crate::value::ExprValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Gt,
    Lt,
    Ge,
    Le,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Static(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEntry {
    Field(String, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(ExprValue),
    Ident(String),
    Unary { op: UnaryOp, arg: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
    Member { object: Box<Expr>, property: Property, optional: bool },
    Call { callee: Box<Expr>, args: Vec<Expr>, optional: bool },
    Array(Vec<Expr>),
    Object(Vec<ObjectEntry>),
    Template { quasis: Vec<String>, exprs: Vec<Expr> },
}

impl BinaryOp {
    pub(crate) fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            ">" => BinaryOp::Gt,
            "<" => BinaryOp::Lt,
            ">=" => BinaryOp::Ge,
            "<=" => BinaryOp::Le,
            "==" => BinaryOp::LooseEq,
            "!=" => BinaryOp::LooseNe,
            "===" => BinaryOp::StrictEq,
            "!==" => BinaryOp::StrictNe,
            _ => return None,
        };
        Some(op)
    }
}

/// Precedencia de los operadores binarios y lógicos (mayor liga más).
pub(crate) fn precedence(symbol: &str) -> Option<u8> {
    let prec = match symbol {
        "*" | "/" | "%" => 7,
        "+" | "-" => 6,
        ">" | "<" | ">=" | "<=" => 5,
        "==" | "!=" | "===" | "!==" => 4,
        "&&" => 3,
        "||" | "??" => 2,
        _ => return None,
    };
    Some(prec)
}
