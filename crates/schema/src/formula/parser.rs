//! Formula tokenizer and recursive-descent parser
//!
//! The grammar only covers what a computed field may express:
//!
//! ```text
//! expr       := or
//! or         := and ( "||" and )*
//! and        := equality ( "&&" equality )*
//! equality   := relational ( ( "==" | "!=" | "===" | "!==" ) relational )*
//! relational := additive ( ( "<" | ">" | "<=" | ">=" ) additive )*
//! additive   := term ( ( "+" | "-" ) term )*
//! term       := unary ( ( "*" | "/" | "%" ) unary )*
//! unary      := ( "!" | "-" | "+" ) unary | primary
//! primary    := number | string | "true" | "false" | "null" | "NaN"
//!             | "Infinity" | "(" expr ")"
//! ```
//!
//! There is no token for identifiers, calls or member access, so nothing
//! outside this grammar can be expressed.

use super::ast::{Expr, UnaryOp};
use loreforge_core::{EngineError, FieldValue};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Reasons a formula fails to parse
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: String },

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("formula nests deeper than {0} levels")]
    TooDeep(usize),
}

impl From<SyntaxError> for EngineError {
    fn from(err: SyntaxError) -> Self {
        EngineError::formula_evaluation(err.to_string())
    }
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Ident(s) => format!("identifier '{}'", s),
            Token::Op(op) => format!("operator '{}'", op),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

/// Longest operators first so `===` wins over `==`
const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "+", "-", "*", "/", "%", "!",
];

fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if c == '(' {
            tokens.push(Token::LParen);
            pos += 1;
            continue;
        }
        if c == ')' {
            tokens.push(Token::RParen);
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(pos + 1).is_some_and(|n| n.is_ascii_digit()))
        {
            let (token, next) = read_number(&chars, pos)?;
            tokens.push(token);
            pos = next;
            continue;
        }

        if c == '"' || c == '\'' {
            let (token, next) = read_string(&chars, pos)?;
            tokens.push(token);
            pos = next;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_' || chars[pos] == '$')
            {
                pos += 1;
            }
            tokens.push(Token::Ident(chars[start..pos].iter().collect()));
            continue;
        }

        let rest: String = chars[pos..chars.len().min(pos + 3)].iter().collect();
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push(Token::Op(op));
                pos += op.len();
            }
            None => return Err(SyntaxError::UnexpectedChar { ch: c, pos }),
        }
    }

    Ok(tokens)
}

fn read_number(chars: &[char], start: usize) -> Result<(Token, usize), SyntaxError> {
    let mut pos = start;
    while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
        pos += 1;
    }
    if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
        let mut exp = pos + 1;
        if exp < chars.len() && (chars[exp] == '+' || chars[exp] == '-') {
            exp += 1;
        }
        if exp < chars.len() && chars[exp].is_ascii_digit() {
            pos = exp;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    let text: String = chars[start..pos].iter().collect();
    text.parse::<f64>()
        .map(|n| (Token::Number(n), pos))
        .map_err(|_| SyntaxError::InvalidNumber(text))
}

fn read_string(chars: &[char], start: usize) -> Result<(Token, usize), SyntaxError> {
    let quote = chars[start];
    let mut value = String::new();
    let mut pos = start + 1;

    while pos < chars.len() {
        match chars[pos] {
            c if c == quote => return Ok((Token::Str(value), pos + 1)),
            '\\' => {
                let escaped = chars
                    .get(pos + 1)
                    .ok_or(SyntaxError::UnterminatedString(start))?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                pos += 2;
            }
            c => {
                value.push(c);
                pos += 1;
            }
        }
    }

    Err(SyntaxError::UnterminatedString(start))
}

// ============================================================================
// Parser
// ============================================================================

/// Deepest AST the parser will build
///
/// Parsing, evaluation and drop all recurse over the tree, so the bound keeps
/// hostile input from exhausting the stack.
pub const MAX_DEPTH: usize = 256;

/// Parse an expression into an AST
pub fn parse(input: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(SyntaxError::UnexpectedToken {
            found: token.describe(),
            expected: "end of formula".to_string(),
        }),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Height of the tree built so far along the current path
    depth: usize,
}

impl Parser {
    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(SyntaxError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Consume the next token if it is one of `ops`
    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn binary_level(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Self) -> Result<Expr, SyntaxError>,
    ) -> Result<Expr, SyntaxError> {
        let mut left = next(self)?;
        // a chain grows the tree one level per operator
        let mut levels = 0;
        while let Some(op) = self.eat_op(ops) {
            self.enter()?;
            levels += 1;
            let right = next(self)?;
            left = Expr::infix(op, left, right);
        }
        self.depth -= levels;
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&["||"], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&["&&"], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&["===", "!==", "==", "!="], Self::parse_relational)
    }

    fn parse_relational(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&["<=", ">=", "<", ">"], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&["+", "-"], Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&["*", "/", "%"], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.eat_op(&["!", "-", "+"]) {
            Some("!") => UnaryOp::Not,
            Some("-") => UnaryOp::Negate,
            Some(_) => UnaryOp::Plus,
            None => return self.parse_primary(),
        };
        self.enter()?;
        let operand = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Literal(FieldValue::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(FieldValue::Text(s))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(FieldValue::Boolean(true))),
                "false" => Ok(Expr::Literal(FieldValue::Boolean(false))),
                "null" => Ok(Expr::Literal(FieldValue::Null)),
                "NaN" => Ok(Expr::Literal(FieldValue::Number(f64::NAN))),
                "Infinity" => Ok(Expr::Literal(FieldValue::Number(f64::INFINITY))),
                _ => Err(SyntaxError::UnknownIdentifier(name)),
            },
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(SyntaxError::UnexpectedToken {
                        found: other.describe(),
                        expected: "')'".to_string(),
                    }),
                    None => Err(SyntaxError::UnexpectedEnd),
                }
            }
            Some(other) => Err(SyntaxError::UnexpectedToken {
                found: other.describe(),
                expected: "a value".to_string(),
            }),
            None => Err(SyntaxError::UnexpectedEnd),
        }
    }
}
