//! Compiled field codecs: the per-field read and write programs the schema
//! compiler assembles and the cursors execute.

use std::fmt;
use std::sync::Arc;

use crate::ast::Expr;
use crate::bits::sign_extend;
use crate::cursor::{ReadCursor, WriteCursor};
use crate::errors::{ReadError, WriteError};
use crate::registry::SubParser;
use crate::value::{Record, Scope, Value};

/// Shared handle to a registered codec pair.
#[derive(Clone)]
pub struct ParserRef(pub Arc<dyn SubParser>);

impl fmt::Debug for ParserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<sub-parser>")
    }
}

/// One compiled declaration: where the value lands, the optional magic
/// literal, and the codec that moves the bytes.
#[derive(Debug, Clone)]
pub struct Op {
    /// Record slot name; `None` discards the value (`_` declarations).
    pub name: Option<String>,
    /// Expected value for magic-checked fields, already decoded the way the
    /// field itself decodes.
    pub magic: Option<Value>,
    pub codec: FieldCodec,
}

#[derive(Debug, Clone)]
pub enum FieldCodec {
    Int {
        bits: usize,
        signed: bool,
        container_bits: usize,
    },
    Float {
        bits: usize,
    },
    StrNul,
    StrFixed {
        len: usize,
    },
    Call {
        parser: String,
        codec: ParserRef,
        args: Vec<Expr>,
    },
    SeqCounted {
        elem: Box<FieldCodec>,
        count: Expr,
    },
    SeqOpen {
        elem: Box<FieldCodec>,
        sentinel: Sentinel,
    },
}

/// Termination marker of an open sequence, fused from the declaration that
/// follows it.
#[derive(Debug, Clone)]
pub enum Sentinel {
    Bits {
        bits: usize,
        raw: u64,
        value: Value,
        field: Option<String>,
    },
    Str {
        bytes: Vec<u8>,
        field: Option<String>,
    },
}

impl Sentinel {
    fn matches(&self, cur: &mut ReadCursor<'_>) -> Result<bool, ReadError> {
        match self {
            Sentinel::Bits { bits, raw, .. } => Ok(cur.peek_bits(*bits)? == *raw),
            Sentinel::Str { bytes, .. } => {
                cur.require_aligned()?;
                Ok(cur.stream().peek_str(bytes.len())? == *bytes)
            }
        }
    }

    fn consume(&self, cur: &mut ReadCursor<'_>) -> Result<(), ReadError> {
        match self {
            Sentinel::Bits { bits, .. } => cur.read_bits(*bits).map(|_| ()),
            Sentinel::Str { bytes, .. } => cur.stream().read_str(bytes.len()).map(|_| ()),
        }
    }

    fn write(&self, cur: &mut WriteCursor<'_>) -> Result<(), WriteError> {
        match self {
            Sentinel::Bits { bits, raw, .. } => cur.write_bits(*raw, *bits),
            Sentinel::Str { bytes, .. } => {
                cur.require_aligned()?;
                cur.write_bytes(bytes)
            }
        }
    }

    /// Slot assignment for a named fused magic field.
    fn slot(&self) -> Option<(&str, Value)> {
        match self {
            Sentinel::Bits { field, value, .. } => {
                field.as_deref().map(|f| (f, value.clone()))
            }
            Sentinel::Str { field, bytes } => {
                field.as_deref().map(|f| (f, Value::Str(bytes.clone())))
            }
        }
    }
}

impl Op {
    pub fn read(
        &self,
        cur: &mut ReadCursor<'_>,
        record: &mut Record,
        param_names: &[String],
        param_values: &[Value],
    ) -> Result<(), ReadError> {
        let value = self.codec.read(cur, record, param_names, param_values)?;

        if let Some(expected) = &self.magic {
            if &value != expected {
                return Err(ReadError::MagicMismatch {
                    expected: expected.clone(),
                    observed: value,
                    bits: self.codec.magic_bits(),
                });
            }
        }

        if let Some(name) = &self.name {
            record.insert(name.clone(), value);
        }
        if let FieldCodec::SeqOpen { sentinel, .. } = &self.codec {
            if let Some((field, value)) = sentinel.slot() {
                record.insert(field, value);
            }
        }
        Ok(())
    }

    pub fn write(
        &self,
        cur: &mut WriteCursor<'_>,
        record: &Record,
        param_names: &[String],
        param_values: &[Value],
    ) -> Result<(), WriteError> {
        let field = self.name.as_deref().unwrap_or("_");
        if let Some(literal) = &self.magic {
            // The literal is what goes on the wire, named or not.
            self.codec
                .write(cur, literal, record, param_names, param_values, field)
        } else if let Some(name) = &self.name {
            let value = record
                .get(name)
                .ok_or_else(|| WriteError::MissingField(name.clone()))?;
            self.codec
                .write(cur, value, record, param_names, param_values, field)
        } else {
            self.codec.write_blank(cur, field)
        }
    }
}

impl FieldCodec {
    fn read(
        &self,
        cur: &mut ReadCursor<'_>,
        record: &Record,
        param_names: &[String],
        param_values: &[Value],
    ) -> Result<Value, ReadError> {
        match self {
            FieldCodec::Int {
                bits,
                signed,
                container_bits,
            } => {
                let raw = cur.read_bits(*bits)?;
                Ok(int_value(raw, *signed, *bits, *container_bits))
            }
            FieldCodec::Float { bits } => {
                let raw = cur.read_bits(*bits)?;
                if *bits == 32 {
                    Ok(Value::F32(f32::from_bits(raw as u32)))
                } else {
                    Ok(Value::F64(f64::from_bits(raw)))
                }
            }
            FieldCodec::StrNul => {
                cur.require_aligned()?;
                let mut bytes = Vec::new();
                loop {
                    let b = cur.stream().read_byte()?;
                    if b == 0 {
                        break;
                    }
                    bytes.push(b);
                }
                Ok(Value::Str(bytes))
            }
            FieldCodec::StrFixed { len } => {
                cur.require_aligned()?;
                Ok(Value::Str(cur.stream().read_str(*len)?))
            }
            FieldCodec::Call { codec, args, .. } => {
                cur.require_aligned()?;
                let scope = Scope::new(record, param_names, param_values);
                let argv = eval_args(args, &scope)?;
                codec.0.get(cur.stream(), &argv)
            }
            FieldCodec::SeqCounted { elem, count } => {
                let scope = Scope::new(record, param_names, param_values);
                let n = count.eval(&scope)?;
                if n < 0 {
                    return Err(ReadError::NegativeCount(n));
                }
                let mut values = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(elem.read(cur, record, param_names, param_values)?);
                }
                Ok(Value::Array(values))
            }
            FieldCodec::SeqOpen { elem, sentinel } => {
                let mut values = Vec::new();
                loop {
                    if sentinel.matches(cur)? {
                        sentinel.consume(cur)?;
                        break;
                    }
                    values.push(elem.read(cur, record, param_names, param_values)?);
                }
                Ok(Value::Array(values))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &self,
        cur: &mut WriteCursor<'_>,
        value: &Value,
        record: &Record,
        param_names: &[String],
        param_values: &[Value],
        field: &str,
    ) -> Result<(), WriteError> {
        match self {
            FieldCodec::Int { bits, .. } => {
                let raw = match value {
                    Value::I64(v) => *v as u64,
                    Value::U64(v) => *v,
                    _ => {
                        return Err(WriteError::TypeMismatch {
                            field: field.to_string(),
                            expected: "integer",
                        });
                    }
                };
                cur.write_bits(raw, *bits)
            }
            FieldCodec::Float { bits } => match (value, bits) {
                (Value::F32(v), 32) => cur.write_bits(u64::from(v.to_bits()), 32),
                (Value::F64(v), 64) => cur.write_bits(v.to_bits(), 64),
                _ => Err(WriteError::TypeMismatch {
                    field: field.to_string(),
                    expected: "float",
                }),
            },
            FieldCodec::StrNul => {
                let bytes = value.as_str().ok_or_else(|| WriteError::TypeMismatch {
                    field: field.to_string(),
                    expected: "string",
                })?;
                cur.require_aligned()?;
                cur.write_bytes(bytes)?;
                cur.write_bytes(&[0])
            }
            FieldCodec::StrFixed { len } => {
                let bytes = value.as_str().ok_or_else(|| WriteError::TypeMismatch {
                    field: field.to_string(),
                    expected: "string",
                })?;
                if bytes.len() != *len {
                    return Err(WriteError::LengthMismatch {
                        field: field.to_string(),
                        expected: *len,
                        actual: bytes.len(),
                    });
                }
                cur.require_aligned()?;
                cur.write_bytes(bytes)
            }
            FieldCodec::Call { codec, args, .. } => {
                cur.require_aligned()?;
                let scope = Scope::new(record, param_names, param_values);
                let argv = eval_args(args, &scope)?;
                codec.0.put(cur.stream(), value, &argv)
            }
            FieldCodec::SeqCounted { elem, count } => {
                let scope = Scope::new(record, param_names, param_values);
                let n = count.eval(&scope)?;
                if n < 0 {
                    return Err(WriteError::NegativeCount(n));
                }
                let values = value.as_array().ok_or_else(|| WriteError::TypeMismatch {
                    field: field.to_string(),
                    expected: "array",
                })?;
                if values.len() != n as usize {
                    return Err(WriteError::SequenceLengthMismatch {
                        field: field.to_string(),
                        expected: n as usize,
                        actual: values.len(),
                    });
                }
                for v in values {
                    elem.write(cur, v, record, param_names, param_values, field)?;
                }
                Ok(())
            }
            FieldCodec::SeqOpen { elem, sentinel } => {
                let values = value.as_array().ok_or_else(|| WriteError::TypeMismatch {
                    field: field.to_string(),
                    expected: "array",
                })?;
                for v in values {
                    elem.write(cur, v, record, param_names, param_values, field)?;
                }
                sentinel.write(cur)
            }
        }
    }

    /// Write side of an anonymous, non-magic declaration: zero bits, or a
    /// lone NUL for terminated strings.
    fn write_blank(&self, cur: &mut WriteCursor<'_>, field: &str) -> Result<(), WriteError> {
        match self {
            FieldCodec::Int { bits, .. } | FieldCodec::Float { bits } => cur.write_bits(0, *bits),
            FieldCodec::StrNul => {
                cur.require_aligned()?;
                cur.write_bytes(&[0])
            }
            FieldCodec::StrFixed { len } => {
                cur.require_aligned()?;
                cur.write_bytes(&vec![0u8; *len])
            }
            // The compiler rejects anonymous calls and sequences.
            _ => Err(WriteError::MissingField(field.to_string())),
        }
    }

    /// Bit width reported in magic mismatch errors.
    fn magic_bits(&self) -> usize {
        match self {
            FieldCodec::Int { bits, .. } | FieldCodec::Float { bits } => *bits,
            FieldCodec::StrFixed { len } => len * 8,
            _ => 0,
        }
    }

    /// Short type notation for diagnostic listings.
    pub fn describe(&self) -> String {
        match self {
            FieldCodec::Int { bits, signed, .. } => {
                format!("{}{}", if *signed { "i" } else { "u" }, bits)
            }
            FieldCodec::Float { bits } => format!("f{}", bits),
            FieldCodec::StrNul => "s".to_string(),
            FieldCodec::StrFixed { len } => format!("s{}", len),
            FieldCodec::Call { parser, args, .. } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                format!("*{}({})", parser, args.join(", "))
            }
            FieldCodec::SeqCounted { elem, count } => {
                format!("{}[{}]", elem.describe(), count)
            }
            FieldCodec::SeqOpen { elem, .. } => format!("{}[]", elem.describe()),
        }
    }
}

/// Decodes a raw field word into its container value. Sub-container widths
/// stay masked; a signed field filling its whole container is natural two's
/// complement.
pub fn int_value(raw: u64, signed: bool, bits: usize, container_bits: usize) -> Value {
    if signed {
        if bits == container_bits {
            Value::I64(sign_extend(raw, bits))
        } else {
            Value::I64(raw as i64)
        }
    } else {
        Value::U64(raw)
    }
}

fn eval_args(args: &[Expr], scope: &Scope<'_>) -> Result<Vec<Value>, crate::errors::EvalError> {
    args.iter()
        .map(|arg| arg.eval(scope).map(Value::I64))
        .collect()
}
