//! Analizador léxico.
//!
//! Produce la secuencia completa de tokens (terminada en `Eof`) o un
//! `ExprError::Invalid` cuando la entrada no puede tokenizarse: cadenas sin
//! cerrar, escapes unicode incorrectos, exponentes vacíos, plantillas sin
//! terminar o una barra invertida suelta.

use crate::errors::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Punct(&'static str),
    Op(String),
    Template(TemplateParts),
    Eof,
}

/// Trozos de una plantilla: `quasis.len() == exprs.len() + 1`. Las
/// expresiones se guardan como texto fuente y el parser las compila.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParts {
    pub quasis: Vec<String>,
    pub exprs: Vec<String>,
}

const THREE_CHAR_OPS: [&str; 3] = ["===", "!==", "..."];
const TWO_CHAR_OPS: [&str; 7] = ["==", "!=", ">=", "<=", "&&", "||", "??"];
const ONE_CHAR_OPS: [char; 9] = ['>', '<', '+', '-', '*', '/', '%', '!', '='];

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut lx = Lexer { src, chars: src.chars().collect(), pos: 0 };
    let mut tokens = Vec::new();
    loop {
        lx.skip_whitespace();
        let Some(ch) = lx.peek() else { break };
        let token = match ch {
            '\\' => return Err(ExprError::invalid(src)),
            '"' | '\'' => lx.read_string()?,
            '`' => lx.read_template()?,
            c if c.is_ascii_digit() => lx.read_number()?,
            c if is_ident_start(c) => lx.read_identifier(),
            _ => lx.read_operator_or_punct(),
        };
        tokens.push(token);
    }
    tokens.push(Token::Eof);
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_ascii_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn invalid(&self) -> ExprError {
        ExprError::invalid(self.src)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{000B}' | '\u{000C}') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn take_digits(&mut self, out: &mut String) {
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            out.push(c);
            self.pos += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token, ExprError> {
        let mut text = String::new();
        self.take_digits(&mut text);
        if self.peek() == Some('.') {
            text.push('.');
            self.pos += 1;
            self.take_digits(&mut text);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            text.push('e');
            self.pos += 1;
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.pos += 1;
            }
            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.invalid());
            }
            self.take_digits(&mut text);
        }
        text.parse::<f64>().map(Token::Number).map_err(|_| self.invalid())
    }

    fn decode_escape(&mut self) -> Result<char, ExprError> {
        let esc = self.bump().ok_or_else(|| self.invalid())?;
        let decoded = match esc {
            'n' => '\n',
            'r' => '\r',
            'f' => '\u{000C}',
            't' => '\t',
            'v' => '\u{000B}',
            'u' => {
                let start = self.pos;
                let mut code = 0u32;
                for _ in 0..4 {
                    match self.bump().and_then(|h| h.to_digit(16)) {
                        Some(d) => code = code * 16 + d,
                        None => {
                            let seq: String = self.chars[start..(start + 4).min(self.chars.len())].iter().collect();
                            return Err(ExprError::invalid_with(self.src, format!("invalid unicode escape [\\u{seq}]")));
                        }
                    }
                }
                char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
            }
            other => other,
        };
        Ok(decoded)
    }

    fn read_string(&mut self) -> Result<Token, ExprError> {
        let quote = self.bump().ok_or_else(|| self.invalid())?;
        let mut out = String::new();
        while let Some(ch) = self.bump() {
            if ch == quote {
                return Ok(Token::Str(out));
            }
            if ch == '\\' {
                out.push(self.decode_escape()?);
            } else {
                out.push(ch);
            }
        }
        Err(self.invalid())
    }

    fn read_template(&mut self) -> Result<Token, ExprError> {
        self.bump();
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();
        let mut cooked = String::new();
        while let Some(ch) = self.bump() {
            match ch {
                '`' => {
                    quasis.push(cooked);
                    return Ok(Token::Template(TemplateParts { quasis, exprs }));
                }
                '\\' => cooked.push(self.decode_escape()?),
                '$' if self.peek() == Some('{') => {
                    self.pos += 1;
                    quasis.push(std::mem::take(&mut cooked));
                    exprs.push(self.read_template_expression()?);
                }
                _ => cooked.push(ch),
            }
        }
        Err(ExprError::invalid_with(self.src, "unterminated template literal"))
    }

    /// Lee el texto de una expresión `${ ... }` hasta su `}` de cierre,
    /// respetando llaves anidadas, cadenas y plantillas internas.
    fn read_template_expression(&mut self) -> Result<String, ExprError> {
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(ch) = self.bump() {
            match ch {
                '\\' => {
                    self.bump();
                }
                '"' | '\'' => self.skip_quoted(ch),
                '`' => self.skip_nested_template(),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(self.chars[start..self.pos - 1].iter().collect());
                    }
                }
                _ => {}
            }
        }
        Err(ExprError::invalid_with(self.src, "unterminated template expression"))
    }

    fn skip_quoted(&mut self, quote: char) {
        while let Some(ch) = self.bump() {
            if ch == '\\' {
                self.bump();
            } else if ch == quote {
                return;
            }
        }
    }

    fn skip_nested_template(&mut self) {
        while let Some(ch) = self.bump() {
            match ch {
                '\\' => {
                    self.bump();
                }
                '`' => return,
                '$' if self.peek() == Some('{') => {
                    self.pos += 1;
                    let mut depth = 1usize;
                    while let Some(inner) = self.bump() {
                        match inner {
                            '\\' => {
                                self.bump();
                            }
                            '"' | '\'' => self.skip_quoted(inner),
                            '`' => self.skip_nested_template(),
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let mut id = String::new();
        while let Some(c) = self.peek().filter(|c| is_ident_part(*c)) {
            id.push(c);
            self.pos += 1;
        }
        match id.to_ascii_lowercase().as_str() {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            "null" => Token::Null,
            "undefined" => Token::Undefined,
            _ => Token::Ident(id),
        }
    }

    fn read_operator_or_punct(&mut self) -> Token {
        let rest: String = self.chars[self.pos..(self.pos + 3).min(self.chars.len())].iter().collect();
        for op in THREE_CHAR_OPS {
            if rest.starts_with(op) {
                self.pos += 3;
                return Token::Op(op.to_string());
            }
        }
        for op in TWO_CHAR_OPS {
            if rest.starts_with(op) {
                self.pos += 2;
                return Token::Op(op.to_string());
            }
        }
        let ch = self.chars[self.pos];
        if ch == '?' && self.peek_at(1) == Some('.') && !self.peek_at(2).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 2;
            return Token::Punct("?.");
        }
        self.pos += 1;
        if ONE_CHAR_OPS.contains(&ch) {
            return Token::Op(ch.to_string());
        }
        match ch {
            '(' => Token::Punct("("),
            ')' => Token::Punct(")"),
            '[' => Token::Punct("["),
            ']' => Token::Punct("]"),
            '{' => Token::Punct("{"),
            '}' => Token::Punct("}"),
            ',' => Token::Punct(","),
            ':' => Token::Punct(":"),
            '.' => Token::Punct("."),
            '?' => Token::Punct("?"),
            // desconocido: el parser lo rechaza
            other => Token::Op(other.to_string()),
        }
    }
}
