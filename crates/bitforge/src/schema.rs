//! Schema compilation and the produced codec pair.
//!
//! [Schema::compile] walks the declaration list exactly once, threading the
//! static bit offset, the set of previously-named fields, and the growing op
//! list. The result is the named aggregate the schema surface promises: a
//! [get](Schema::get)/[put](Schema::put) pair that are inverses for
//! well-formed records.

use indexmap::IndexMap;

use crate::ast::{Declaration, Expr, KindSpec, Literal, Param};
use crate::bits;
use crate::compiled::{int_value, FieldCodec, Op, ParserRef, Sentinel};
use crate::cursor::{ReadCursor, WriteCursor};
use crate::errors::{CompileError, ReadError, WriteError};
use crate::layout;
use crate::parser;
use crate::registry::{Registry, SubParser};
use crate::stream::Stream;
use crate::types::{self, FieldTy, TyKind};
use crate::value::{Record, Value};

/// A compiled schema: the codec pair plus the parameter list both routines
/// take. Use [Schema::compile] to build one from schema text.
#[derive(Debug, Clone)]
pub struct Schema {
    param_names: Vec<String>,
    ops: Vec<Op>,
}

impl Schema {
    /// Compiles schema text into a codec pair. Sub-parser references
    /// (`*name(…)`) resolve against `registry`.
    pub fn compile(source: &str, registry: Option<&Registry>) -> Result<Schema, CompileError> {
        let (params, decls) = parser::parse(source)?;
        let mut compiler = Compiler::new(registry);

        for param in &params {
            compiler.declare_param(param)?;
        }

        let mut i = 0;
        while i < decls.len() {
            i = compiler.declaration(&decls, i)?;
        }

        let schema = Schema {
            param_names: compiler.param_names,
            ops: compiler.ops,
        };
        tracing::debug!(fields = schema.ops.len(), "schema compiled");
        tracing::trace!(listing = %schema.dump(), "compiled schema listing");
        Ok(schema)
    }

    /// Reads one record from the stream. `params` supplies the extra
    /// parameters declared at the head of the schema, in order.
    pub fn get(&self, stream: &mut dyn Stream, params: &[Value]) -> Result<Record, ReadError> {
        if params.len() != self.param_names.len() {
            return Err(ReadError::ParamCount {
                expected: self.param_names.len(),
                got: params.len(),
            });
        }
        let mut cur = ReadCursor::new(stream);
        let mut record = Record::new();
        for op in &self.ops {
            op.read(&mut cur, &mut record, &self.param_names, params)?;
        }
        cur.finish();
        Ok(record)
    }

    /// Writes one record to the stream, the exact inverse of
    /// [get](Schema::get) for records it produced.
    pub fn put(
        &self,
        stream: &mut dyn Stream,
        record: &Record,
        params: &[Value],
    ) -> Result<(), WriteError> {
        if params.len() != self.param_names.len() {
            return Err(WriteError::ParamCount {
                expected: self.param_names.len(),
                got: params.len(),
            });
        }
        let mut cur = WriteCursor::new(stream);
        for op in &self.ops {
            op.write(&mut cur, record, &self.param_names, params)?;
        }
        cur.finish()
    }

    /// Diagnostic listing of the compiled ops. Also emitted through
    /// `tracing::trace!` when a schema compiles.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if !self.param_names.is_empty() {
            out.push_str(&format!("params: {}\n", self.param_names.join(", ")));
        }
        for (i, op) in self.ops.iter().enumerate() {
            let target = op.name.as_deref().unwrap_or("_");
            out.push_str(&format!("[{}] {} -> {}", i, op.codec.describe(), target));
            if let Some(magic) = &op.magic {
                out.push_str(&format!(" = {}", magic));
            }
            out.push('\n');
        }
        out
    }
}

/// Compiled schemas are themselves sub-parsers, so schemas nest.
impl SubParser for Schema {
    fn get(&self, stream: &mut dyn Stream, args: &[Value]) -> Result<Value, ReadError> {
        Ok(Value::Record(Schema::get(self, stream, args)?))
    }

    fn put(
        &self,
        stream: &mut dyn Stream,
        value: &Value,
        args: &[Value],
    ) -> Result<(), WriteError> {
        let record = value.as_record().ok_or(WriteError::NotARecord)?;
        Schema::put(self, stream, record, args)
    }
}

/// Single-pass compile state.
struct Compiler<'r> {
    registry: Option<&'r Registry>,
    param_names: Vec<String>,
    /// Declared parameter name, and whether it is integer-valued.
    params: IndexMap<String, bool>,
    /// Previously-named fields, and whether each is integer-valued.
    seen: IndexMap<String, bool>,
    /// Static bit offset within the current byte. The run-time cursors keep
    /// the read and write offsets independently; this one only drives
    /// compile-time admissibility checks.
    offset: usize,
    ops: Vec<Op>,
}

impl<'r> Compiler<'r> {
    fn new(registry: Option<&'r Registry>) -> Compiler<'r> {
        Compiler {
            registry,
            param_names: Vec::new(),
            params: IndexMap::new(),
            seen: IndexMap::new(),
            offset: 0,
            ops: Vec::new(),
        }
    }

    fn declare_param(&mut self, param: &Param) -> Result<(), CompileError> {
        let ty = types::decode(&param.ty)?;
        if self.params.contains_key(&param.name) {
            return Err(CompileError::DuplicateName(param.name.clone()));
        }
        self.params
            .insert(param.name.clone(), ty.container.is_int());
        self.param_names.push(param.name.clone());
        Ok(())
    }

    /// Compiles the declaration at `index`, returning the index of the next
    /// one (open sequences consume their trailing magic declaration too).
    fn declaration(&mut self, decls: &[Declaration], index: usize) -> Result<usize, CompileError> {
        let decl = &decls[index];
        let ty = types::decode(&decl.ty)?;

        if let TyKind::Call { args, .. } = &ty.kind {
            for arg in args {
                self.check_expr(arg)?;
            }
        }

        match &decl.kind {
            KindSpec::Named(name) => {
                let (codec, magic) = self.scalar(&ty, decl.magic.as_ref(), false)?;
                self.advance_for(&ty);
                self.register(name, ty.container.is_int())?;
                self.ops.push(Op {
                    name: Some(name.clone()),
                    magic,
                    codec,
                });
                Ok(index + 1)
            }
            KindSpec::Anonymous => {
                let (codec, magic) = self.scalar(&ty, decl.magic.as_ref(), true)?;
                self.advance_for(&ty);
                self.ops.push(Op {
                    name: None,
                    magic,
                    codec,
                });
                Ok(index + 1)
            }
            KindSpec::Counted { name, count } => {
                if decl.magic.is_some() {
                    return Err(CompileError::MagicOnSequence(name.clone()));
                }
                self.check_expr(count)?;
                let (elem, _) = self.scalar(&ty, None, false)?;
                // Sequences are arrays, never usable in length expressions.
                self.register(name, false)?;
                self.ops.push(Op {
                    name: Some(name.clone()),
                    magic: None,
                    codec: FieldCodec::SeqCounted {
                        elem: Box::new(elem),
                        count: count.clone(),
                    },
                });
                // Per-element offsets realign every bit cycle, so the static
                // offset after the sequence is its entry offset.
                Ok(index + 1)
            }
            KindSpec::Open { name } => {
                if decl.magic.is_some() {
                    return Err(CompileError::MagicOnSequence(name.clone()));
                }
                let terminator = decls
                    .get(index + 1)
                    .ok_or_else(|| CompileError::UnterminatedOpenSequence(name.clone()))?;
                let (elem, _) = self.scalar(&ty, None, false)?;
                let sentinel = self.sentinel(name, terminator)?;
                self.register(name, false)?;
                if let Some(field) = terminator.kind.name() {
                    let sty = types::decode(&terminator.ty)?;
                    self.register(field, sty.container.is_int())?;
                }
                self.ops.push(Op {
                    name: Some(name.clone()),
                    magic: None,
                    codec: FieldCodec::SeqOpen {
                        elem: Box::new(elem),
                        sentinel,
                    },
                });
                Ok(index + 2)
            }
        }
    }

    /// Builds the codec for one scalar occurrence, folding in the magic
    /// literal when present.
    fn scalar(
        &self,
        ty: &FieldTy,
        magic: Option<&Literal>,
        anonymous: bool,
    ) -> Result<(FieldCodec, Option<Value>), CompileError> {
        match &ty.kind {
            TyKind::Int { signed } => {
                let container_bits = ty.container.bits().unwrap_or(64);
                let codec = FieldCodec::Int {
                    bits: ty.bits,
                    signed: *signed,
                    container_bits,
                };
                let magic = match magic {
                    None => None,
                    Some(Literal::Int(v)) => {
                        let (_, value) = magic_int(*v, ty.bits, *signed, container_bits)?;
                        Some(value)
                    }
                    Some(Literal::Str(_)) => return Err(CompileError::MagicTypeMismatch),
                };
                Ok((codec, magic))
            }
            TyKind::Float => {
                if magic.is_some() {
                    return Err(CompileError::MagicTypeMismatch);
                }
                Ok((FieldCodec::Float { bits: ty.bits }, None))
            }
            TyKind::StrNul => {
                if self.offset != 0 {
                    return Err(CompileError::UnalignedString(self.offset));
                }
                match magic {
                    None => Ok((FieldCodec::StrNul, None)),
                    // A magic string's size is inferred from the literal.
                    Some(Literal::Str(bytes)) => Ok((
                        FieldCodec::StrFixed { len: bytes.len() },
                        Some(Value::Str(bytes.clone())),
                    )),
                    Some(Literal::Int(_)) => Err(CompileError::MagicTypeMismatch),
                }
            }
            TyKind::StrFixed { len } => {
                if self.offset != 0 {
                    return Err(CompileError::UnalignedString(self.offset));
                }
                let magic = match magic {
                    None => None,
                    Some(Literal::Str(bytes)) => {
                        if bytes.len() != *len {
                            return Err(CompileError::MagicLengthMismatch {
                                literal: bytes.len(),
                                declared: *len,
                            });
                        }
                        Some(Value::Str(bytes.clone()))
                    }
                    Some(Literal::Int(_)) => return Err(CompileError::MagicTypeMismatch),
                };
                Ok((FieldCodec::StrFixed { len: *len }, magic))
            }
            TyKind::Call { parser, args } => {
                if self.offset != 0 {
                    return Err(CompileError::UnalignedCall(self.offset));
                }
                if anonymous {
                    return Err(CompileError::AnonymousCall);
                }
                if magic.is_some() {
                    return Err(CompileError::MagicTypeMismatch);
                }
                let codec = self
                    .registry
                    .and_then(|r| r.get(parser))
                    .ok_or_else(|| CompileError::UnknownSubParser(parser.clone()))?;
                Ok((
                    FieldCodec::Call {
                        parser: parser.clone(),
                        codec: ParserRef(codec.clone()),
                        args: args.clone(),
                    },
                    None,
                ))
            }
        }
    }

    /// Fuses the declaration after an open sequence into its sentinel.
    fn sentinel(&self, seq: &str, decl: &Declaration) -> Result<Sentinel, CompileError> {
        let literal = match (&decl.kind, &decl.magic) {
            (KindSpec::Named(_) | KindSpec::Anonymous, Some(literal)) => literal,
            _ => return Err(CompileError::UnterminatedOpenSequence(seq.to_string())),
        };
        let field = decl.kind.name().map(str::to_string);
        let ty = types::decode(&decl.ty)?;

        match (&ty.kind, literal) {
            (TyKind::Int { signed }, Literal::Int(v)) => {
                let container_bits = ty.container.bits().unwrap_or(64);
                let (raw, value) = magic_int(*v, ty.bits, *signed, container_bits)?;
                Ok(Sentinel::Bits {
                    bits: ty.bits,
                    raw,
                    value,
                    field,
                })
            }
            (TyKind::StrNul, Literal::Str(bytes)) => Ok(Sentinel::Str {
                bytes: bytes.clone(),
                field,
            }),
            (TyKind::StrFixed { len }, Literal::Str(bytes)) => {
                if bytes.len() != *len {
                    return Err(CompileError::MagicLengthMismatch {
                        literal: bytes.len(),
                        declared: *len,
                    });
                }
                Ok(Sentinel::Str {
                    bytes: bytes.clone(),
                    field,
                })
            }
            _ => Err(CompileError::MagicTypeMismatch),
        }
    }

    fn register(&mut self, name: &str, is_int: bool) -> Result<(), CompileError> {
        if self.seen.contains_key(name) || self.params.contains_key(name) {
            return Err(CompileError::DuplicateName(name.to_string()));
        }
        self.seen.insert(name.to_string(), is_int);
        Ok(())
    }

    fn advance_for(&mut self, ty: &FieldTy) {
        // Strings and calls are byte-aligned by admissibility, so only
        // integer and float widths move the static offset.
        if matches!(ty.kind, TyKind::Int { .. } | TyKind::Float) {
            self.offset = layout::advance(self.offset, ty.bits);
        }
    }

    /// Every identifier in a length or argument expression must name a
    /// previously-declared integer field or parameter. The check recurses
    /// into all sub-expressions.
    fn check_expr(&self, expr: &Expr) -> Result<(), CompileError> {
        let mut err = None;
        expr.for_each_ident(&mut |name| {
            if err.is_some() {
                return;
            }
            match self.seen.get(name).or_else(|| self.params.get(name)) {
                Some(true) => {}
                Some(false) => err = Some(CompileError::NonIntegerReference(name.to_string())),
                None => err = Some(CompileError::UnknownReference(name.to_string())),
            }
        });
        match err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Validates a magic integer literal against the field width and returns its
/// raw wire bits plus the decoded comparison value.
fn magic_int(
    literal: i64,
    bits: usize,
    signed: bool,
    container_bits: usize,
) -> Result<(u64, Value), CompileError> {
    let mask = bits::mask(bits);
    let fits = if literal >= 0 {
        literal as u64 <= mask
    } else {
        signed && bits == container_bits && (bits == 64 || literal >= -(1i64 << (bits - 1)))
    };
    if !fits {
        return Err(CompileError::MagicOutOfRange { literal, bits });
    }
    let raw = (literal as u64) & mask;
    Ok((raw, int_value(raw, signed, bits, container_bits)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indoc::indoc;

    use super::*;
    use crate::stream::MemoryStream;

    fn compile(source: &str) -> Schema {
        Schema::compile(source, None).unwrap()
    }

    /// Reads `bytes`, asserts the whole stream was consumed, writes the
    /// record back, and asserts the exact bytes reappear.
    fn roundtrip(schema: &Schema, bytes: &[u8]) -> Record {
        let mut input = MemoryStream::from(bytes.to_vec());
        let record = schema.get(&mut input, &[]).unwrap();
        assert_eq!(
            input.position(),
            bytes.len() as u64,
            "get must consume the whole stream"
        );

        let mut output = MemoryStream::new();
        schema.put(&mut output, &record, &[]).unwrap();
        assert_eq!(output.as_bytes(), bytes, "put must reproduce the input");
        record
    }

    fn ints(values: &[i64]) -> Value {
        Value::Array(values.iter().map(|&v| Value::I64(v)).collect())
    }

    fn uints(values: &[u64]) -> Value {
        Value::Array(values.iter().map(|&v| Value::U64(v)).collect())
    }

    #[test]
    fn test_empty_schema_yields_empty_record() {
        let schema = compile("");
        let mut stream = MemoryStream::from(vec![1, 2, 3]);
        let record = schema.get(&mut stream, &[]).unwrap();
        assert!(record.is_empty());
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_nested_stream_scenario() {
        let list = compile("(n: u16) u8: count; u8: data[count*n]");
        let mut registry = Registry::new();
        registry.insert("list", Arc::new(list));

        let schema = Schema::compile(
            indoc! {r#"
                u8: _ = 128;
                u16: size;
                4: data[size*2];
                s: str[];
                s: _ = "9xC\0";
                *list(size): inner;
                u8: _ = 67
            "#},
            Some(&registry),
        )
        .unwrap();

        let bytes = [
            0x80, 0x00, 0x02, 0x12, 0x34, 0x48, 0x69, 0x00, 0x39, 0x78, 0x43, 0x00, 0x02,
            0x0A, 0x0B, 0x01, 0x02, 0x43,
        ];
        let record = roundtrip(&schema, &bytes);

        assert_eq!(record.get("size"), Some(&Value::U64(2)));
        assert_eq!(record.get("data"), Some(&ints(&[1, 2, 3, 4])));
        assert_eq!(
            record.get("str"),
            Some(&Value::Array(vec![Value::str("Hi")]))
        );
        let inner = record.get("inner").unwrap().as_record().unwrap();
        assert_eq!(inner.get("count"), Some(&Value::U64(2)));
        assert_eq!(inner.get("data"), Some(&uints(&[10, 11, 1, 2])));
    }

    #[test]
    fn test_three_bit_sequence_scenario() {
        let schema = compile("3: test[8]");
        let mut record = Record::new();
        record.insert("test", ints(&[1, 2, 3, 4, 5, 6, 7, 0]));

        let mut stream = MemoryStream::new();
        schema.put(&mut stream, &record, &[]).unwrap();
        assert_eq!(stream.as_bytes(), &[0x29, 0xCB, 0xB8]);
        assert_eq!(stream.as_bytes().len(), (3 * 8 + 7) / 8);

        stream.set_position(0);
        let back = schema.get(&mut stream, &[]).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_ccsds_primary_header_scenario() {
        let schema = compile("u3: version; u1: packet_type; u1: secondary_header; u11: apid");
        let mut record = Record::new();
        record.insert("version", Value::U64(0));
        record.insert("packet_type", Value::U64(0));
        record.insert("secondary_header", Value::U64(1));
        record.insert("apid", Value::U64(6));

        let mut stream = MemoryStream::new();
        schema.put(&mut stream, &record, &[]).unwrap();
        assert_eq!(stream.as_bytes(), &[0x08, 0x06]);

        stream.set_position(0);
        assert_eq!(schema.get(&mut stream, &[]).unwrap(), record);
    }

    #[test]
    fn test_magic_mismatch_scenario() {
        let schema = compile("u8: _ = 128");
        let mut stream = MemoryStream::from(vec![0x7F]);
        assert_eq!(
            schema.get(&mut stream, &[]).unwrap_err(),
            ReadError::MagicMismatch {
                expected: Value::U64(128),
                observed: Value::U64(127),
                bits: 8,
            }
        );
    }

    #[test]
    fn test_short_stream_scenario() {
        let schema = compile("u32: x");
        let mut stream = MemoryStream::from(vec![1, 2, 3]);
        assert_eq!(
            schema.get(&mut stream, &[]).unwrap_err(),
            ReadError::Io {
                wanted: 4,
                position: 0
            }
        );
    }

    #[test]
    fn test_sub_parser_argument_flows_through() {
        let list = compile("(n: u16) u8: count; u8: data[count*n]");

        // Standalone round trip with n = 3.
        let mut stream = MemoryStream::from(vec![0x01, 0x07, 0x08, 0x09]);
        let record = list.get(&mut stream, &[Value::U64(3)]).unwrap();
        assert_eq!(record.get("data"), Some(&uints(&[7, 8, 9])));
        let mut out = MemoryStream::new();
        list.put(&mut out, &record, &[Value::U64(3)]).unwrap();
        assert_eq!(out.as_bytes(), &[0x01, 0x07, 0x08, 0x09]);

        // Embedded: the outer `size` feeds the invocation in both directions.
        let mut registry = Registry::new();
        registry.insert("list", Arc::new(list));
        let outer =
            Schema::compile("u16: size; *list(size): inner", Some(&registry)).unwrap();

        let bytes = [0x00, 0x03, 0x01, 0x07, 0x08, 0x09];
        let record = roundtrip(&outer, &bytes);
        let inner = record.get("inner").unwrap().as_record().unwrap();
        assert_eq!(inner.get("data"), Some(&uints(&[7, 8, 9])));
    }

    #[test]
    fn test_sub_byte_field_crossing_byte_boundary() {
        // 4-bit field entering at offset 6: both halves land correctly.
        let schema = compile("u6: a; u4: b; u6: c");
        let record = roundtrip(&schema, &[0b101010_10, 0b11_110011]);
        assert_eq!(record.get("a"), Some(&Value::U64(0b101010)));
        assert_eq!(record.get("b"), Some(&Value::U64(0b1011)));
        assert_eq!(record.get("c"), Some(&Value::U64(0b110011)));
    }

    #[test]
    fn test_boundary_widths_roundtrip() {
        let schema = compile("u1: a; u3: b; u11: c; u64: d");
        let mut record = Record::new();
        record.insert("a", Value::U64(1));
        record.insert("b", Value::U64(5));
        record.insert("c", Value::U64(2047));
        record.insert("d", Value::U64(u64::MAX - 1));

        let mut stream = MemoryStream::new();
        schema.put(&mut stream, &record, &[]).unwrap();
        // 79 bits, zero-padded into ten bytes.
        assert_eq!(stream.as_bytes().len(), 10);

        stream.set_position(0);
        assert_eq!(schema.get(&mut stream, &[]).unwrap(), record);
        assert_eq!(stream.position(), 10);
    }

    #[test]
    fn test_byte_accounting_on_partial_cycle() {
        // Three 3-bit elements stop mid-cycle; reader and writer still agree
        // on the byte count.
        let schema = compile("u8: n; 3: xs[n]");
        let mut record = Record::new();
        record.insert("n", Value::U64(3));
        record.insert("xs", ints(&[6, 2, 5]));

        let mut stream = MemoryStream::new();
        schema.put(&mut stream, &record, &[]).unwrap();
        assert_eq!(stream.as_bytes().len(), 1 + (3 * 3 + 7) / 8);

        stream.set_position(0);
        assert_eq!(schema.get(&mut stream, &[]).unwrap(), record);
        assert_eq!(stream.position(), 3);
    }

    #[test]
    fn test_empty_counted_sequence() {
        let schema = compile("u8: n; u16: xs[n]");
        let record = roundtrip(&schema, &[0x00]);
        assert_eq!(record.get("xs"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn test_empty_nul_terminated_string() {
        let schema = compile("s: v");
        let record = roundtrip(&schema, &[0x00]);
        assert_eq!(record.get("v"), Some(&Value::str("")));
    }

    #[test]
    fn test_sentinel_on_first_peek_gives_empty_sequence() {
        let schema = compile("u8: xs[]; u8: _ = 67");
        let record = roundtrip(&schema, &[0x43]);
        assert_eq!(record.get("xs"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn test_named_sentinel_lands_in_record() {
        let schema = compile("u8: xs[]; u8: term = 67");
        let record = roundtrip(&schema, &[0x01, 0x02, 0x43]);
        assert_eq!(record.get("xs"), Some(&uints(&[1, 2])));
        assert_eq!(record.get("term"), Some(&Value::U64(67)));
    }

    #[test]
    fn test_named_magic_always_emits_the_literal() {
        let schema = compile("u8: version = 2");
        let record = roundtrip(&schema, &[0x02]);
        assert_eq!(record.get("version"), Some(&Value::U64(2)));

        let mut tampered = Record::new();
        tampered.insert("version", Value::U64(9));
        let mut stream = MemoryStream::new();
        schema.put(&mut stream, &tampered, &[]).unwrap();
        assert_eq!(stream.as_bytes(), &[0x02]);
    }

    #[test]
    fn test_fixed_string_roundtrip_and_length_check() {
        let schema = compile("s4: tag");
        let record = roundtrip(&schema, b"RIFF");
        assert_eq!(record.get("tag"), Some(&Value::str("RIFF")));

        let mut short = Record::new();
        short.insert("tag", Value::str("RIF"));
        let mut stream = MemoryStream::new();
        assert_eq!(
            schema.put(&mut stream, &short, &[]).unwrap_err(),
            WriteError::LengthMismatch {
                field: "tag".to_string(),
                expected: 4,
                actual: 3,
            }
        );
    }

    #[test]
    fn test_float_fields_roundtrip_big_endian() {
        let schema = compile("f32: x; f64: y");
        let mut record = Record::new();
        record.insert("x", Value::F32(1.5));
        record.insert("y", Value::F64(-0.25));

        let mut stream = MemoryStream::new();
        schema.put(&mut stream, &record, &[]).unwrap();
        assert_eq!(
            stream.as_bytes(),
            &[0x3F, 0xC0, 0x00, 0x00, 0xBF, 0xD0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );

        stream.set_position(0);
        assert_eq!(schema.get(&mut stream, &[]).unwrap(), record);
    }

    #[test]
    fn test_extra_parameters() {
        let schema = compile("(n: u8) u8: data[n]");
        let mut stream = MemoryStream::from(vec![0x0A, 0x0B]);
        let record = schema.get(&mut stream, &[Value::U64(2)]).unwrap();
        assert_eq!(record.get("data"), Some(&uints(&[10, 11])));

        let mut out = MemoryStream::new();
        schema.put(&mut out, &record, &[Value::U64(2)]).unwrap();
        assert_eq!(out.as_bytes(), &[0x0A, 0x0B]);

        let mut stream = MemoryStream::from(vec![0x0A]);
        assert_eq!(
            schema.get(&mut stream, &[]).unwrap_err(),
            ReadError::ParamCount {
                expected: 1,
                got: 0
            }
        );
    }

    #[test]
    fn test_anonymous_field_reads_skip_and_writes_zeros() {
        let schema = compile("u8: _; u8: b");
        let mut stream = MemoryStream::from(vec![0xAA, 0xBB]);
        let record = schema.get(&mut stream, &[]).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("b"), Some(&Value::U64(0xBB)));

        let mut out = MemoryStream::new();
        schema.put(&mut out, &record, &[]).unwrap();
        assert_eq!(out.as_bytes(), &[0x00, 0xBB]);
    }

    #[test]
    fn test_anonymous_nul_string_discards_and_emits_one_nul() {
        let schema = compile("s: _; u8: b");
        let mut stream = MemoryStream::from(vec![0x41, 0x42, 0x00, 0x07]);
        let record = schema.get(&mut stream, &[]).unwrap();
        assert_eq!(record.get("b"), Some(&Value::U64(7)));

        let mut out = MemoryStream::new();
        schema.put(&mut out, &record, &[]).unwrap();
        assert_eq!(out.as_bytes(), &[0x00, 0x07]);
    }

    #[test]
    fn test_signed_container_semantics() {
        // Full container width: natural two's complement.
        let schema = compile("8: a");
        let record = roundtrip(&schema, &[0xFF]);
        assert_eq!(record.get("a"), Some(&Value::I64(-1)));

        // Sub-container width: masked, no sign extension.
        let schema = compile("4: hi; 4: lo");
        let record = roundtrip(&schema, &[0xF0]);
        assert_eq!(record.get("hi"), Some(&Value::I64(15)));
        assert_eq!(record.get("lo"), Some(&Value::I64(0)));
    }

    #[test]
    fn test_compile_rejects_unaligned_string() {
        assert_eq!(
            Schema::compile("4: a; s: v", None).unwrap_err(),
            CompileError::UnalignedString(4)
        );
    }

    #[test]
    fn test_compile_rejects_open_sequence_without_magic() {
        assert_eq!(
            Schema::compile("u8: xs[]", None).unwrap_err(),
            CompileError::UnterminatedOpenSequence("xs".to_string())
        );
        assert_eq!(
            Schema::compile("u8: xs[]; u8: y", None).unwrap_err(),
            CompileError::UnterminatedOpenSequence("xs".to_string())
        );
    }

    #[test]
    fn test_compile_rejects_unknown_reference() {
        assert_eq!(
            Schema::compile("u8: data[count]", None).unwrap_err(),
            CompileError::UnknownReference("count".to_string())
        );
    }

    #[test]
    fn test_compile_rejects_non_integer_reference() {
        assert_eq!(
            Schema::compile("s: name; u8: data[name]", None).unwrap_err(),
            CompileError::NonIntegerReference("name".to_string())
        );
    }

    #[test]
    fn test_compile_rejects_duplicate_names() {
        assert_eq!(
            Schema::compile("u8: a; u16: a", None).unwrap_err(),
            CompileError::DuplicateName("a".to_string())
        );
    }

    #[test]
    fn test_compile_rejects_magic_out_of_range() {
        assert_eq!(
            Schema::compile("u4: _ = 16", None).unwrap_err(),
            CompileError::MagicOutOfRange {
                literal: 16,
                bits: 4
            }
        );
    }

    #[test]
    fn test_compile_rejects_unknown_sub_parser() {
        assert_eq!(
            Schema::compile("*nope(): x", None).unwrap_err(),
            CompileError::UnknownSubParser("nope".to_string())
        );
    }

    #[test]
    fn test_compile_rejects_float_magic() {
        assert_eq!(
            Schema::compile("f32: x = 1", None).unwrap_err(),
            CompileError::MagicTypeMismatch
        );
    }

    #[test]
    fn test_compile_rejects_magic_on_sequence() {
        assert_eq!(
            Schema::compile("u8: xs[2] = 1", None).unwrap_err(),
            CompileError::MagicOnSequence("xs".to_string())
        );
    }

    #[test]
    fn test_dump_lists_compiled_ops() {
        let schema = compile("u16: size; 4: data[size*2]; u8: _ = 67");
        let dump = schema.dump();
        assert!(dump.contains("u16 -> size"));
        assert!(dump.contains("i4[(size * 2)] -> data"));
        assert!(dump.contains("u8 -> _ = 67"));
    }
}
