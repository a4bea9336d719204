//! Parsed schema entities: declarations, raw type tokens, and the length
//! expressions that may reference previously-named fields.

use std::fmt;

use crate::errors::EvalError;
use crate::value::Scope;

/// Extra parameter declared at the head of a schema; becomes an additional
/// input of both codec routines, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeToken,
}

/// One schema statement: `type ':' kind ('=' literal)?`.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub ty: TypeToken,
    pub kind: KindSpec,
    pub magic: Option<Literal>,
}

/// A field-type token as written, before decoding into width and container.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeToken {
    /// Bare integer literal: a signed integer of that many bits.
    Bits(i64),
    /// Prefixed word such as `u16`, `f32`, `s`, `s4`.
    Word(String),
    /// `*name(args…)`: reference to an externally registered codec pair.
    Call { parser: String, args: Vec<Expr> },
}

/// Field name and multiplicity.
#[derive(Debug, Clone, PartialEq)]
pub enum KindSpec {
    Named(String),
    Anonymous,
    /// `name[expr]`: sequence with an explicit element count.
    Counted { name: String, count: Expr },
    /// `name[]`: sequence terminated by the following magic declaration.
    Open { name: String },
}

impl KindSpec {
    pub fn name(&self) -> Option<&str> {
        match self {
            KindSpec::Named(name)
            | KindSpec::Counted { name, .. }
            | KindSpec::Open { name } => Some(name),
            KindSpec::Anonymous => None,
        }
    }
}

/// A magic literal: the fixed value verified on read and emitted on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Str(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

/// Length / argument expression over integer literals and prior field or
/// parameter names.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Ident(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Visits every bare identifier in the expression tree, recursing into
    /// all sub-expressions.
    pub fn for_each_ident(&self, f: &mut impl FnMut(&str)) {
        match self {
            Expr::Int(_) => {}
            Expr::Ident(name) => f(name),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.for_each_ident(f);
                rhs.for_each_ident(f);
            }
        }
    }

    /// Evaluates against the record decoded so far plus the extra
    /// parameters. Identifiers resolve to fields first, then parameters.
    pub fn eval(&self, scope: &Scope<'_>) -> Result<i64, EvalError> {
        match self {
            Expr::Int(v) => Ok(*v),
            Expr::Ident(name) => scope.lookup_int(name),
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(scope)?;
                let r = rhs.eval(scope)?;
                let out = match op {
                    BinOp::Add => l.checked_add(r),
                    BinOp::Sub => l.checked_sub(r),
                    BinOp::Mul => l.checked_mul(r),
                    BinOp::Div if r == 0 => return Err(EvalError::DivisionByZero),
                    BinOp::Div => l.checked_div(r),
                    BinOp::Rem if r == 0 => return Err(EvalError::DivisionByZero),
                    BinOp::Rem => l.checked_rem(r),
                };
                out.ok_or(EvalError::Overflow)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(v) => write!(f, "{}", v),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
        }
    }
}
