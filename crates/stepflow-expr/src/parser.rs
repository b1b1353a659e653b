//! Parser descendente recursivo con escalada de precedencia.
//!
//! Gramática (de menor a mayor prioridad):
//! `cond := binary ('?' expr ':' expr)?`, operadores binarios según
//! [`precedence`](crate::ast), unarios `! + -`, postfijos `.x`, `?.x`,
//! `[e]`, `?.[e]`, `(args)`, `?.(args)` y primarios.

use crate::ast::{precedence, BinaryOp, Expr, LogicalOp, ObjectEntry, Property, UnaryOp};
use crate::errors::ExprError;
use crate::lexer::{tokenize, TemplateParts, Token};
use crate::value::ExprValue;

/// Profundidad máxima de anidamiento del árbol. Por encima se rechaza la
/// fuente en lugar de agotar la pila al parsear o evaluar.
pub const MAX_DEPTH: usize = 256;

pub struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

/// Parsea una expresión completa; tokens sobrantes son un error de gramática.
pub fn parse(src: &str, tokens: Vec<Token>) -> Result<Expr, ExprError> {
    parse_at_depth(src, tokens, 0)
}

fn parse_at_depth(src: &str, tokens: Vec<Token>, depth: usize) -> Result<Expr, ExprError> {
    let mut ps = Parser { src, tokens, pos: 0, depth };
    let expr = ps.parse_expression()?.ok_or_else(|| ps.error())?;
    if !ps.at_eof() {
        return Err(ps.error());
    }
    Ok(expr)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tk = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tk
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn error(&self) -> ExprError {
        ExprError::parse(self.src)
    }

    fn is_punct(&self, value: &str) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == value)
    }

    fn is_op(&self, value: &str) -> bool {
        matches!(self.peek(), Token::Op(op) if op == value)
    }

    fn expect_punct(&mut self, value: &str) -> Result<(), ExprError> {
        if !self.is_punct(value) {
            return Err(self.error());
        }
        self.pos += 1;
        Ok(())
    }

    fn must(&self, node: Option<Expr>) -> Result<Expr, ExprError> {
        node.ok_or_else(|| self.error())
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::invalid_with(self.src, "expression nested too deeply"));
        }
        Ok(())
    }

    pub fn parse_expression(&mut self) -> Result<Option<Expr>, ExprError> {
        self.descend()?;
        let expr = self.parse_expression_inner();
        self.depth -= 1;
        expr
    }

    fn parse_expression_inner(&mut self) -> Result<Option<Expr>, ExprError> {
        let Some(unary) = self.parse_unary()? else { return Ok(None) };
        let binary = self.parse_binary_rhs(1, unary)?;
        self.parse_conditional(binary).map(Some)
    }

    fn parse_conditional(&mut self, test: Expr) -> Result<Expr, ExprError> {
        if !self.is_punct("?") {
            return Ok(test);
        }
        self.pos += 1;
        let consequent = self.parse_expression()?;
        let consequent = self.must(consequent)?;
        self.expect_punct(":")?;
        let alternate = self.parse_expression()?;
        let alternate = self.must(alternate)?;
        Ok(Expr::Conditional { test: Box::new(test),
                               consequent: Box::new(consequent),
                               alternate: Box::new(alternate) })
    }

    fn peek_precedence(&self) -> Option<u8> {
        match self.peek() {
            Token::Op(op) => precedence(op),
            _ => None,
        }
    }

    fn parse_binary_rhs(&mut self, min_prec: u8, left: Expr) -> Result<Expr, ExprError> {
        let mut lhs = left;
        let base = self.depth;
        while let Some(prec) = self.peek_precedence().filter(|p| *p >= min_prec) {
            // cada operador encadenado profundiza el lado izquierdo
            self.descend()?;
            let Token::Op(symbol) = self.advance() else { return Err(self.error()) };
            let rhs = self.parse_unary()?;
            let mut rhs = self.must(rhs)?;
            while let Some(next_prec) = self.peek_precedence().filter(|p| *p > prec) {
                rhs = self.parse_binary_rhs(next_prec, rhs)?;
            }
            lhs = match symbol.as_str() {
                "&&" => logical(LogicalOp::And, lhs, rhs),
                "||" => logical(LogicalOp::Or, lhs, rhs),
                "??" => logical(LogicalOp::Coalesce, lhs, rhs),
                other => {
                    let op = BinaryOp::from_symbol(other).ok_or_else(|| self.error())?;
                    Expr::Binary { op, left: Box::new(lhs), right: Box::new(rhs) }
                }
            };
        }
        self.depth = base;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Option<Expr>, ExprError> {
        let op = match self.peek() {
            Token::Op(op) if op == "!" => Some(UnaryOp::Not),
            Token::Op(op) if op == "+" => Some(UnaryOp::Plus),
            Token::Op(op) if op == "-" => Some(UnaryOp::Minus),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            self.descend()?;
            let arg = self.parse_unary()?;
            self.depth -= 1;
            let arg = self.must(arg)?;
            return Ok(Some(Expr::Unary { op, arg: Box::new(arg) }));
        }
        let primary = self.parse_primary()?;
        match primary {
            Some(base) => self.parse_postfix(base).map(Some),
            None => Ok(None),
        }
    }

    fn parse_primary(&mut self) -> Result<Option<Expr>, ExprError> {
        let node = match self.peek().clone() {
            Token::Number(n) => Expr::Literal(ExprValue::Number(n)),
            Token::Str(s) => Expr::Literal(ExprValue::Str(s)),
            Token::Bool(b) => Expr::Literal(ExprValue::Bool(b)),
            Token::Null => Expr::Literal(ExprValue::Null),
            Token::Undefined => Expr::Literal(ExprValue::Undefined),
            Token::Ident(name) => Expr::Ident(name),
            Token::Template(parts) => self.template(parts)?,
            Token::Punct("(") => {
                self.pos += 1;
                let inner = self.parse_expression()?;
                self.expect_punct(")")?;
                return Ok(Some(inner.unwrap_or(Expr::Literal(ExprValue::Undefined))));
            }
            Token::Punct("[") => return self.parse_array().map(Some),
            Token::Punct("{") => return self.parse_object().map(Some),
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(node))
    }

    fn template(&self, parts: TemplateParts) -> Result<Expr, ExprError> {
        let mut exprs = Vec::with_capacity(parts.exprs.len());
        for source in &parts.exprs {
            let tokens = tokenize(source)?;
            exprs.push(parse_at_depth(source, tokens, self.depth + 1)?);
        }
        Ok(Expr::Template { quasis: parts.quasis, exprs })
    }

    fn parse_array(&mut self) -> Result<Expr, ExprError> {
        self.expect_punct("[")?;
        let mut elements = Vec::new();
        while !self.at_eof() && !self.is_punct("]") {
            if let Some(el) = self.parse_expression()? {
                elements.push(el);
            }
            if self.is_punct(",") {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(Expr::Array(elements))
    }

    fn parse_object(&mut self) -> Result<Expr, ExprError> {
        self.expect_punct("{")?;
        let mut entries = Vec::new();
        while !self.at_eof() && !self.is_punct("}") {
            if self.is_op("...") {
                self.pos += 1;
                let arg = self.parse_expression()?;
                entries.push(ObjectEntry::Spread(self.must(arg)?));
            } else {
                let key = match self.advance() {
                    Token::Ident(k) | Token::Str(k) => k,
                    _ => return Err(self.error()),
                };
                if self.is_punct(":") {
                    self.pos += 1;
                    let value = self.parse_expression()?;
                    entries.push(ObjectEntry::Field(key, self.must(value)?));
                } else {
                    // shorthand `{ a }`
                    entries.push(ObjectEntry::Field(key.clone(), Expr::Ident(key)));
                }
            }
            if self.is_punct(",") {
                self.pos += 1;
            } else if !self.is_punct("}") {
                return Err(self.error());
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(entries))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if !self.is_punct(")") {
            loop {
                if let Some(arg) = self.parse_expression()? {
                    args.push(arg);
                }
                if self.is_punct(",") {
                    self.pos += 1;
                    continue;
                }
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn parse_postfix(&mut self, base: Expr) -> Result<Expr, ExprError> {
        let mut expr = base;
        let depth = self.depth;
        loop {
            if self.is_punct("?.") || self.is_punct(".") || self.is_punct("[") || self.is_punct("(") {
                self.descend()?;
            }
            let optional = self.is_punct("?.");
            if optional || self.is_punct(".") {
                self.pos += 1;
                match self.peek().clone() {
                    Token::Ident(name) => {
                        self.pos += 1;
                        expr = member(expr, Property::Static(name), optional);
                    }
                    Token::Punct("[") if optional => {
                        self.pos += 1;
                        expr = self.computed_member(expr, true)?;
                    }
                    Token::Punct("(") if optional => {
                        self.pos += 1;
                        let args = self.parse_call_args()?;
                        expr = Expr::Call { callee: Box::new(expr), args, optional: true };
                    }
                    _ => return Err(self.error()),
                }
                continue;
            }
            if self.is_punct("[") {
                self.pos += 1;
                expr = self.computed_member(expr, false)?;
                continue;
            }
            if self.is_punct("(") {
                self.pos += 1;
                let args = self.parse_call_args()?;
                expr = Expr::Call { callee: Box::new(expr), args, optional: false };
                continue;
            }
            self.depth = depth;
            return Ok(expr);
        }
    }

    fn computed_member(&mut self, object: Expr, optional: bool) -> Result<Expr, ExprError> {
        let property = self.parse_expression()?;
        let property = self.must(property)?;
        self.expect_punct("]")?;
        Ok(member(object, Property::Computed(Box::new(property)), optional))
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical { op, left: Box::new(left), right: Box::new(right) }
}

fn member(object: Expr, property: Property, optional: bool) -> Expr {
    Expr::Member { object: Box::new(object), property, optional }
}
