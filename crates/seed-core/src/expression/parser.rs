//! Parser por precedencia de operadores (subconjunto de expresiones estilo JS).
//!
//! Precedencias, de menor a mayor:
//! `?:` < `||` < `&&` < igualdad < relacionales < aditivos < multiplicativos
//! < unarios < postfijos (llamada / miembro / índice) < primarios.

use super::error::EvalError;
use super::lexer::{Lexer, Spanned, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Array(Vec<Expr>),
    Ident(String),
    Member { object: Box<Expr>, property: String },
    Index { object: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    New { callee: Box<Expr>, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Conditional { test: Box<Expr>, consequent: Box<Expr>, alternate: Box<Expr> },
}

/// Máximo de tokens por expresión; acota también la profundidad del AST.
pub const MAX_TOKENS: usize = 512;

/// Máximo anidamiento de subexpresiones y operadores unarios.
pub const MAX_NESTING: usize = 32;

pub struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
    depth: usize,
}

/// Tokeniza y parsea una expresión completa (debe consumir toda la entrada).
pub fn parse(src: &str) -> Result<Expr, EvalError> {
    let tokens = Lexer::tokenize(src)?;
    if tokens.len() > MAX_TOKENS {
        return Err(EvalError::syntax(0, format!("expression too long ({} tokens)", tokens.len())));
    }
    let mut parser = Parser { tokens, cursor: 0, depth: 0 };
    let expr = parser.expression()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(EvalError::syntax(parser.pos(), format!("unexpected token {other:?}"))),
    }
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.cursor).map(|s| &s.token).unwrap_or(&Token::Eof)
    }

    fn pos(&self) -> usize {
        self.tokens.get(self.cursor).map(|s| s.pos).unwrap_or_default()
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), EvalError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(EvalError::syntax(self.pos(), format!("expected {expected:?}, found {:?}", self.peek())))
        }
    }

    fn expression(&mut self) -> Result<Expr, EvalError> {
        self.nested(Self::conditional)
    }

    fn nested(&mut self, rule: fn(&mut Self) -> Result<Expr, EvalError>) -> Result<Expr, EvalError> {
        if self.depth >= MAX_NESTING {
            return Err(EvalError::syntax(self.pos(), "expression nested too deeply"));
        }
        self.depth += 1;
        let out = rule(self);
        self.depth -= 1;
        out
    }

    fn conditional(&mut self) -> Result<Expr, EvalError> {
        let test = self.logical_or()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect(Token::Colon)?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional { test: Box::new(test),
                               consequent: Box::new(consequent),
                               alternate: Box::new(alternate) })
    }

    fn logical_or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.logical_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.logical_and()?;
            left = Expr::Logical { op: LogicalOp::Or, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = Expr::Logical { op: LogicalOp::And, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                Token::EqEqEq => BinaryOp::StrictEq,
                Token::NotEqEq => BinaryOp::StrictNotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.relational()?;
            left = binary(op, left, right);
        }
    }

    fn relational(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary { op, operand: Box::new(operand) })
    }

    fn postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = if self.eat(&Token::New) { self.new_expression()? } else { self.primary()? };
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let property = self.property_name()?;
                    expr = Expr::Member { object: Box::new(expr), property };
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index { object: Box::new(expr), index: Box::new(index) };
                }
                Token::LParen => {
                    self.advance();
                    let args = self.arguments()?;
                    expr = Expr::Call { callee: Box::new(expr), args };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// `new X.y(args)`: el callee admite accesos a miembro pero no llamadas.
    fn new_expression(&mut self) -> Result<Expr, EvalError> {
        let mut callee = self.primary()?;
        while self.eat(&Token::Dot) {
            let property = self.property_name()?;
            callee = Expr::Member { object: Box::new(callee), property };
        }
        let args = if self.eat(&Token::LParen) { self.arguments()? } else { Vec::new() };
        Ok(Expr::New { callee: Box::new(callee), args })
    }

    /// Tras `.` se admiten también palabras reservadas como nombre de propiedad.
    fn property_name(&mut self) -> Result<String, EvalError> {
        let pos = self.pos();
        match self.advance() {
            Token::Ident(name) => Ok(name),
            Token::True => Ok("true".into()),
            Token::False => Ok("false".into()),
            Token::Null => Ok("null".into()),
            Token::Undefined => Ok("undefined".into()),
            Token::New => Ok("new".into()),
            other => Err(EvalError::syntax(pos, format!("expected property name, found {other:?}"))),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let pos = self.pos();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::True => Ok(Expr::Literal(Literal::Bool(true))),
            Token::False => Ok(Expr::Literal(Literal::Bool(false))),
            Token::Null => Ok(Expr::Literal(Literal::Null)),
            Token::Undefined => Ok(Expr::Literal(Literal::Undefined)),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if self.eat(&Token::RBracket) {
                    return Ok(Expr::Array(items));
                }
                loop {
                    items.push(self.expression()?);
                    if self.eat(&Token::RBracket) {
                        return Ok(Expr::Array(items));
                    }
                    self.expect(Token::Comma)?;
                }
            }
            Token::Eof => Err(EvalError::syntax(pos, "unexpected end of expression")),
            other => Err(EvalError::syntax(pos, format!("unexpected token {other:?}"))),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.into()))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("1 + 2 * 3").unwrap();
        let Expr::Binary { op: BinaryOp::Add, right, .. } = expr else { panic!("expected addition") };
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn method_call_on_member() {
        let expr = parse("moment().add(1, 'days')").unwrap();
        let Expr::Call { callee, args } = expr else { panic!("expected call") };
        assert_eq!(args.len(), 2);
        let Expr::Member { object, property } = *callee else { panic!("expected member") };
        assert_eq!(property, "add");
        assert_eq!(*object, Expr::Call { callee: ident("moment"), args: vec![] });
    }

    #[test]
    fn new_with_member_callee() {
        let expr = parse("new Date('2020-01-01').getTime()").unwrap();
        let Expr::Call { callee, .. } = expr else { panic!("expected call") };
        let Expr::Member { object, .. } = *callee else { panic!("expected member") };
        assert!(matches!(*object, Expr::New { .. }));
    }

    #[test]
    fn conditional_is_right_associative() {
        let expr = parse("a ? b : c ? d : e").unwrap();
        let Expr::Conditional { alternate, .. } = expr else { panic!("expected conditional") };
        assert!(matches!(*alternate, Expr::Conditional { .. }));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        assert!(matches!(parse("a b"), Err(EvalError::Syntax { .. })));
        assert!(matches!(parse(""), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(parse(&deep), Err(EvalError::Syntax { .. })));
        let nested = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(matches!(parse(&nested), Err(EvalError::Syntax { .. })));
        let shallow = format!("{}1{}", "(".repeat(8), ")".repeat(8));
        assert_eq!(parse(&shallow).unwrap(), Expr::Literal(Literal::Number(1.0)));
    }

    #[test]
    fn unary_chains_are_bounded() {
        assert!(matches!(parse(&format!("{}1", "-".repeat(100))), Err(EvalError::Syntax { .. })));
        assert!(parse("!!true").is_ok());
    }

    #[test]
    fn long_operator_chains_are_rejected() {
        let long = vec!["1"; MAX_TOKENS].join("+");
        assert!(matches!(parse(&long), Err(EvalError::Syntax { .. })));
        assert!(parse(&vec!["1"; 20].join("+")).is_ok());
    }
}
