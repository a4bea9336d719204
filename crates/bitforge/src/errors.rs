use thiserror::Error;

use crate::value::Value;

/// Schema compilation failures. All of these are raised before any byte of a
/// stream is touched; the compiled codecs only ever raise [ReadError] or
/// [WriteError].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error at byte {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("unknown field type `{0}`")]
    UnknownType(String),
    #[error("integer fields must be 1..=64 bits wide, got {0}")]
    InvalidIntWidth(usize),
    #[error("float fields must be 32 or 64 bits wide, got {0}")]
    InvalidFloatWidth(usize),
    #[error("string field must begin on a byte boundary, not at bit offset {0}")]
    UnalignedString(usize),
    #[error("sub-parser call must begin on a byte boundary, not at bit offset {0}")]
    UnalignedCall(usize),
    #[error("duplicate field name `{0}`")]
    DuplicateName(String),
    #[error("`{0}` does not name a previous field or a declared parameter")]
    UnknownReference(String),
    #[error("`{0}` is not an integer and cannot appear in a length expression")]
    NonIntegerReference(String),
    #[error("open sequence `{0}` must be followed by a magic-checked field")]
    UnterminatedOpenSequence(String),
    #[error("unknown sub-parser `{0}`")]
    UnknownSubParser(String),
    #[error("anonymous sub-parser fields cannot be written back")]
    AnonymousCall,
    #[error("magic literal {literal} does not fit in {bits} bits")]
    MagicOutOfRange { literal: i64, bits: usize },
    #[error("magic literal type does not match the field type")]
    MagicTypeMismatch,
    #[error("magic string is {literal} bytes but the field declares {declared}")]
    MagicLengthMismatch { literal: usize, declared: usize },
    #[error("sequence `{0}` cannot carry a magic literal")]
    MagicOnSequence(String),
}

/// Length-expression evaluation failures, shared by the read and write paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("`{0}` is not present in the record")]
    Missing(String),
    #[error("`{0}` is not an integer value")]
    NotAnInteger(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

/// Runtime failures raised by a compiled reader.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReadError {
    #[error("stream could not supply {wanted} bytes at position {position}")]
    Io { wanted: usize, position: u64 },
    #[error("magic mismatch: expected {expected}, observed {observed} ({bits}-bit field)")]
    MagicMismatch {
        expected: Value,
        observed: Value,
        bits: usize,
    },
    #[error("sequence count evaluated to {0}")]
    NegativeCount(i64),
    #[error("field starts mid-byte")]
    Unaligned,
    #[error("schema takes {expected} extra parameters, got {got}")]
    ParamCount { expected: usize, got: usize },
    #[error("length expression failed: {0}")]
    Expr(#[from] EvalError),
}

/// Runtime failures raised by a compiled writer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WriteError {
    #[error("stream refused {wanted} bytes at position {position}")]
    Io { wanted: usize, position: u64 },
    #[error("fixed-length string `{field}` is {actual} bytes, declared {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("sequence `{field}` has {actual} elements, its count expression gives {expected}")]
    SequenceLengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("record is missing field `{0}`")]
    MissingField(String),
    #[error("field `{field}` holds the wrong kind of value, expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
    #[error("sub-parser expected a record value")]
    NotARecord,
    #[error("sequence count evaluated to {0}")]
    NegativeCount(i64),
    #[error("field starts mid-byte")]
    Unaligned,
    #[error("schema takes {expected} extra parameters, got {got}")]
    ParamCount { expected: usize, got: usize },
    #[error("length expression failed: {0}")]
    Expr(#[from] EvalError),
}
