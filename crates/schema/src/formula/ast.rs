//! Formula AST and interpreter
//!
//! Operators follow the loose typing users expect from spreadsheet-style
//! formulas: `+` concatenates when either side is text, `==` converts
//! between numbers, text and booleans, `===` does not, and `&&` / `||`
//! return one of their operands.

use loreforge_core::FieldValue;
use std::cmp::Ordering;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}

impl BinaryOp {
    /// Map an operator symbol produced by the tokenizer
    pub(crate) fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "===" => BinaryOp::StrictEq,
            _ => BinaryOp::StrictNe,
        }
    }
}

/// Short-circuiting operators; the result is one of the operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "&&" => Some(LogicalOp::And),
            "||" => Some(LogicalOp::Or),
            _ => None,
        }
    }
}

/// Parsed formula expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(FieldValue),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Build the node for an infix operator symbol produced by the tokenizer
    pub(crate) fn infix(symbol: &str, left: Expr, right: Expr) -> Self {
        let (left, right) = (Box::new(left), Box::new(right));
        match LogicalOp::from_symbol(symbol) {
            Some(op) => Expr::Logical { op, left, right },
            None => Expr::Binary {
                op: BinaryOp::from_symbol(symbol),
                left,
                right,
            },
        }
    }

    /// Evaluate the expression
    pub fn eval(&self) -> FieldValue {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Unary { op, operand } => {
                let value = operand.eval();
                match op {
                    UnaryOp::Not => FieldValue::Boolean(!value.is_truthy()),
                    UnaryOp::Negate => FieldValue::Number(-value.to_number()),
                    UnaryOp::Plus => FieldValue::Number(value.to_number()),
                }
            }
            Expr::Binary { op, left, right } => apply_binary(*op, left.eval(), right.eval()),
            Expr::Logical { op, left, right } => {
                let l = left.eval();
                match (op, l.is_truthy()) {
                    (LogicalOp::And, true) | (LogicalOp::Or, false) => right.eval(),
                    _ => l,
                }
            }
        }
    }
}

fn is_textual(value: &FieldValue) -> bool {
    matches!(value, FieldValue::Text(_) | FieldValue::List(_))
}

fn apply_binary(op: BinaryOp, l: FieldValue, r: FieldValue) -> FieldValue {
    match op {
        BinaryOp::Add => {
            if is_textual(&l) || is_textual(&r) {
                FieldValue::Text(format!(
                    "{}{}",
                    l.to_display_string(),
                    r.to_display_string()
                ))
            } else {
                FieldValue::Number(l.to_number() + r.to_number())
            }
        }
        BinaryOp::Sub => FieldValue::Number(l.to_number() - r.to_number()),
        BinaryOp::Mul => FieldValue::Number(l.to_number() * r.to_number()),
        BinaryOp::Div => FieldValue::Number(l.to_number() / r.to_number()),
        BinaryOp::Rem => FieldValue::Number(l.to_number() % r.to_number()),
        BinaryOp::Lt => FieldValue::Boolean(compare(&l, &r) == Some(Ordering::Less)),
        BinaryOp::Gt => FieldValue::Boolean(compare(&l, &r) == Some(Ordering::Greater)),
        BinaryOp::Le => FieldValue::Boolean(matches!(
            compare(&l, &r),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Ge => FieldValue::Boolean(matches!(
            compare(&l, &r),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => FieldValue::Boolean(loose_equals(&l, &r)),
        BinaryOp::Ne => FieldValue::Boolean(!loose_equals(&l, &r)),
        BinaryOp::StrictEq => FieldValue::Boolean(strict_equals(&l, &r)),
        BinaryOp::StrictNe => FieldValue::Boolean(!strict_equals(&l, &r)),
    }
}

/// Relational comparison; `None` when either side is NaN
fn compare(l: &FieldValue, r: &FieldValue) -> Option<Ordering> {
    if is_textual(l) && is_textual(r) {
        return Some(l.to_display_string().cmp(&r.to_display_string()));
    }
    l.to_number().partial_cmp(&r.to_number())
}

fn strict_equals(l: &FieldValue, r: &FieldValue) -> bool {
    match (l, r) {
        (FieldValue::Null, FieldValue::Null) => true,
        (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a == b,
        (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
        (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
        // lists are compared by identity, and two evaluated lists never share one
        _ => false,
    }
}

fn loose_equals(l: &FieldValue, r: &FieldValue) -> bool {
    match (l, r) {
        (FieldValue::Null, FieldValue::Null) => true,
        (FieldValue::Null, _) | (_, FieldValue::Null) => false,
        (FieldValue::List(_), FieldValue::List(_)) => false,
        (FieldValue::List(items), other) | (other, FieldValue::List(items)) => {
            loose_equals(&FieldValue::Text(items.join(",")), other)
        }
        (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
        (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a == b,
        _ => l.to_number() == r.to_number(),
    }
}
