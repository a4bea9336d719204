//! Field-type decoding: one type token to bit width, container, and codec
//! family.

use crate::ast::{Expr, TypeToken};
use crate::errors::CompileError;

/// Machine container holding a decoded field in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Str,
    Record,
}

impl Container {
    /// Width in bits for integer and float containers.
    pub fn bits(&self) -> Option<usize> {
        match self {
            Container::I8 | Container::U8 => Some(8),
            Container::I16 | Container::U16 => Some(16),
            Container::I32 | Container::U32 | Container::F32 => Some(32),
            Container::I64 | Container::U64 | Container::F64 => Some(64),
            Container::Str | Container::Record => None,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(
            self,
            Container::I8
                | Container::I16
                | Container::I32
                | Container::I64
                | Container::U8
                | Container::U16
                | Container::U32
                | Container::U64
        )
    }
}

/// Codec family a field belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum TyKind {
    Int { signed: bool },
    Float,
    /// NUL-terminated byte string.
    StrNul,
    /// Fixed byte-count string; `len` is in bytes, not bits.
    StrFixed { len: usize },
    /// Externally registered codec pair with forwarded arguments.
    Call { parser: String, args: Vec<Expr> },
}

/// Decoded field type: bit width, record container, codec family.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTy {
    /// Width in bits. Zero for NUL-terminated strings and sub-parser calls,
    /// whose extent is not known until run time.
    pub bits: usize,
    pub container: Container,
    pub kind: TyKind,
}

/// Resolves a type token per the schema language rules.
pub fn decode(token: &TypeToken) -> Result<FieldTy, CompileError> {
    match token {
        TypeToken::Bits(bits) => {
            let bits = int_width(*bits)?;
            Ok(FieldTy {
                bits,
                container: signed_container(bits),
                kind: TyKind::Int { signed: true },
            })
        }
        TypeToken::Word(word) => decode_word(word),
        TypeToken::Call { parser, args } => Ok(FieldTy {
            bits: 0,
            container: Container::Record,
            kind: TyKind::Call {
                parser: parser.clone(),
                args: args.clone(),
            },
        }),
    }
}

fn decode_word(word: &str) -> Result<FieldTy, CompileError> {
    let digits_at = word
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(word.len());
    let (prefix, digits) = word.split_at(digits_at);
    let width: Option<usize> = if digits.is_empty() {
        None
    } else {
        match digits.parse() {
            Ok(w) => Some(w),
            Err(_) => return Err(CompileError::UnknownType(word.to_string())),
        }
    };

    match (prefix, width) {
        ("u", Some(bits)) => {
            let bits = int_width(bits as i64)?;
            Ok(FieldTy {
                bits,
                container: unsigned_container(bits),
                kind: TyKind::Int { signed: false },
            })
        }
        ("f", Some(32)) => Ok(FieldTy {
            bits: 32,
            container: Container::F32,
            kind: TyKind::Float,
        }),
        ("f", Some(64)) => Ok(FieldTy {
            bits: 64,
            container: Container::F64,
            kind: TyKind::Float,
        }),
        ("f", Some(bits)) => Err(CompileError::InvalidFloatWidth(bits)),
        ("s", None) => Ok(FieldTy {
            bits: 0,
            container: Container::Str,
            kind: TyKind::StrNul,
        }),
        ("s", Some(len)) => Ok(FieldTy {
            bits: len * 8,
            container: Container::Str,
            kind: TyKind::StrFixed { len },
        }),
        _ => Err(CompileError::UnknownType(word.to_string())),
    }
}

fn int_width(bits: i64) -> Result<usize, CompileError> {
    if (1..=64).contains(&bits) {
        Ok(bits as usize)
    } else {
        Err(CompileError::InvalidIntWidth(bits.max(0) as usize))
    }
}

fn signed_container(bits: usize) -> Container {
    match bits {
        1..=8 => Container::I8,
        9..=16 => Container::I16,
        17..=32 => Container::I32,
        _ => Container::I64,
    }
}

fn unsigned_container(bits: usize) -> Container {
    match bits {
        1..=8 => Container::U8,
        9..=16 => Container::U16,
        17..=32 => Container::U32,
        _ => Container::U64,
    }
}
