//! Named sub-parser codecs, referenced from schemas as `*name(args…)`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{ReadError, WriteError};
use crate::stream::Stream;
use crate::value::Value;

/// A codec pair invoked as a nested element. [Schema](crate::schema::Schema)
/// implements this, so compiled schemas compose; callers may also register
/// hand-written codecs.
pub trait SubParser: Send + Sync {
    /// Reads one value from the stream, given the forwarded arguments.
    fn get(&self, stream: &mut dyn Stream, args: &[Value]) -> Result<Value, ReadError>;

    /// Writes `value` back, given the same arguments.
    fn put(&self, stream: &mut dyn Stream, value: &Value, args: &[Value])
        -> Result<(), WriteError>;
}

/// Name to codec-pair table consulted while compiling `*name(…)` tokens.
#[derive(Default, Clone)]
pub struct Registry {
    parsers: HashMap<String, Arc<dyn SubParser>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, parser: Arc<dyn SubParser>) {
        self.parsers.insert(name.into(), parser);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SubParser>> {
        self.parsers.get(name)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("parsers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ByteEcho;

    impl SubParser for ByteEcho {
        fn get(&self, stream: &mut dyn Stream, _args: &[Value]) -> Result<Value, ReadError> {
            Ok(Value::U64(u64::from(stream.read_byte()?)))
        }

        fn put(
            &self,
            stream: &mut dyn Stream,
            value: &Value,
            _args: &[Value],
        ) -> Result<(), WriteError> {
            let byte = value.as_int().unwrap_or(0) as u8;
            stream.write_bytes(&[byte])
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = Registry::new();
        registry.insert("echo", Arc::new(ByteEcho));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_custom_sub_parser_roundtrip() {
        use crate::stream::MemoryStream;

        let codec = ByteEcho;
        let mut stream = MemoryStream::new();
        codec
            .put(&mut stream, &Value::U64(0x5A), &[])
            .unwrap();
        stream.set_position(0);
        assert_eq!(codec.get(&mut stream, &[]).unwrap(), Value::U64(0x5A));
    }
}
