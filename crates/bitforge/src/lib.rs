//! # bitforge
//!
//! A declarative binary-format compiler: from a terse schema describing the
//! byte- and bit-level layout of a record, build a matched pair of codec
//! routines — a reader that turns a byte stream into a structured record and
//! a writer that turns the record back into the exact byte sequence.
//!
//! Schemas are compiled once into an intermediate representation; the
//! resulting [schema::Schema] carries the `get`/`put` pair. Sub-byte fields,
//! magic-checked constants, counted and magic-terminated sequences, strings,
//! and nested sub-parsers are all part of the schema language. All multi-byte
//! values travel big-endian, MSB-first.
//!
//! ## Example
//!
//! ```
//! use bitforge::schema::Schema;
//! use bitforge::stream::MemoryStream;
//! use bitforge::value::Value;
//!
//! let schema = Schema::compile("u8: _ = 128; u16: size; u8: body[size]", None).unwrap();
//!
//! let mut input = MemoryStream::from(vec![0x80, 0x00, 0x02, 0x0A, 0x0B]);
//! let record = schema.get(&mut input, &[]).unwrap();
//! assert_eq!(record.get("size"), Some(&Value::U64(2)));
//!
//! let mut output = MemoryStream::new();
//! schema.put(&mut output, &record, &[]).unwrap();
//! assert_eq!(output.as_bytes(), &[0x80, 0x00, 0x02, 0x0A, 0x0B]);
//! ```

pub mod ast;
pub mod bits;
pub mod compiled;
pub mod cursor;
pub mod errors;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod stream;
pub mod types;
pub mod value;
