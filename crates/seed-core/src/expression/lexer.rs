//! Tokenizador de expresiones.
//!
//! Produce una secuencia de tokens con su offset (bytes) para reportar errores
//! de sintaxis. Un `=` aislado no es un operador válido: las expresiones no
//! admiten asignaciones.

use std::iter::Peekable;
use std::str::CharIndices;

use super::error::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Undefined,
    New,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Question,
    Colon,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Eof,
}

/// Token con su posición de inicio.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, chars: src.char_indices().peekable() }
    }

    /// Tokeniza toda la entrada; el último token siempre es `Eof`.
    pub fn tokenize(src: &str) -> Result<Vec<Spanned>, EvalError> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let done = tok.token == Token::Eof;
            out.push(tok);
            if done {
                return Ok(out);
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some((_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some((_, c)) if *c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> Result<Spanned, EvalError> {
        self.skip_whitespace();
        let Some((pos, c)) = self.chars.next() else {
            return Ok(Spanned { token: Token::Eof, pos: self.src.len() });
        };
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '?' => Token::Question,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '.' if matches!(self.chars.peek(), Some((_, d)) if d.is_ascii_digit()) => self.number(pos)?,
            '.' => Token::Dot,
            '!' => {
                if self.eat('=') {
                    if self.eat('=') { Token::NotEqEq } else { Token::NotEq }
                } else {
                    Token::Bang
                }
            }
            '=' => {
                if !self.eat('=') {
                    return Err(EvalError::syntax(pos, "assignment is not supported"));
                }
                if self.eat('=') { Token::EqEqEq } else { Token::EqEq }
            }
            '<' => if self.eat('=') { Token::Le } else { Token::Lt },
            '>' => if self.eat('=') { Token::Ge } else { Token::Gt },
            '&' => {
                if !self.eat('&') {
                    return Err(EvalError::syntax(pos, "bitwise operators are not supported"));
                }
                Token::AndAnd
            }
            '|' => {
                if !self.eat('|') {
                    return Err(EvalError::syntax(pos, "bitwise operators are not supported"));
                }
                Token::OrOr
            }
            '\'' | '"' => self.string(pos, c)?,
            d if d.is_ascii_digit() => self.number(pos)?,
            a if is_ident_start(a) => self.word(pos, a),
            other => return Err(EvalError::syntax(pos, format!("unexpected character '{other}'"))),
        };
        Ok(Spanned { token, pos })
    }

    fn number(&mut self, start: usize) -> Result<Token, EvalError> {
        let mut end = start + 1;
        let mut seen_dot = self.src[start..].starts_with('.');
        let mut seen_exp = false;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.chars.next();
                end = i + 1;
            } else if c == '.' && !seen_dot && !seen_exp {
                // `1.toFixed` no es válido; exigimos dígito tras el punto
                let next_is_digit = self.src[i + 1..].chars().next().is_some_and(|n| n.is_ascii_digit());
                if !next_is_digit {
                    break;
                }
                seen_dot = true;
                self.chars.next();
                end = i + 1;
            } else if (c == 'e' || c == 'E') && !seen_exp {
                seen_exp = true;
                self.chars.next();
                end = i + 1;
                if let Some(&(j, sign)) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        self.chars.next();
                        end = j + 1;
                    }
                }
            } else {
                break;
            }
        }
        self.src[start..end]
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| EvalError::syntax(start, format!("invalid number '{}'", &self.src[start..end])))
    }

    fn string(&mut self, start: usize, quote: char) -> Result<Token, EvalError> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                c if c == quote => return Ok(Token::Str(out)),
                '\\' => {
                    let Some((_, esc)) = self.chars.next() else { break };
                    out.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                other => out.push(other),
            }
        }
        Err(EvalError::syntax(start, "unterminated string literal"))
    }

    fn word(&mut self, start: usize, first: char) -> Token {
        let mut end = start + first.len_utf8();
        while let Some(&(i, c)) = self.chars.peek() {
            if is_ident_part(c) {
                self.chars.next();
                end = i + c.len_utf8();
            } else {
                break;
            }
        }
        match &self.src[start..end] {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "undefined" => Token::Undefined,
            "new" => Token::New,
            ident => Token::Ident(ident.to_string()),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
