//! Runtime values produced by a compiled reader and consumed by a writer.

use std::fmt;

use indexmap::IndexMap;

use crate::errors::EvalError;

/// A single decoded field value.
///
/// Integer fields land in `I64`/`U64` according to their declared signedness,
/// strings are byte strings, sequences are `Array`s of the element value, and
/// sub-parser results are nested `Record`s.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(Vec<u8>),
    Array(Vec<Value>),
    Record(Record),
}

impl Value {
    /// Byte-string value from a `&str`, for tests and literals.
    pub fn str(s: &str) -> Value {
        Value::Str(s.as_bytes().to_vec())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            Value::Str(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I64(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Str(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Record(record) => {
                write!(f, "{{")?;
                for (i, (name, v)) in record.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// The flat ordered collection of named fields a reader yields: one slot per
/// non-anonymous declaration, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Record {
        Record {
            fields: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Record {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Name resolution environment for length expressions: the record decoded so
/// far, then the extra parameters, in that order.
pub struct Scope<'a> {
    record: &'a Record,
    param_names: &'a [String],
    param_values: &'a [Value],
}

impl<'a> Scope<'a> {
    pub fn new(
        record: &'a Record,
        param_names: &'a [String],
        param_values: &'a [Value],
    ) -> Scope<'a> {
        Scope {
            record,
            param_names,
            param_values,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.record.get(name) {
            return Some(value);
        }
        self.param_names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.param_values.get(i))
    }

    pub fn lookup_int(&self, name: &str) -> Result<i64, EvalError> {
        let value = self
            .lookup(name)
            .ok_or_else(|| EvalError::Missing(name.to_string()))?;
        value
            .as_int()
            .ok_or_else(|| EvalError::NotAnInteger(name.to_string()))
    }
}
