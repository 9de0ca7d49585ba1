//! Write-only JSON serialization.
//!
//! The codec handles a closed set of shapes: null, strings, timestamps,
//! sequences, string-keyed mappings, and anything that can present itself
//! as a mapping via [`ToJsonObject`]. Everything else enters through its
//! text representation and is written as a JSON string. There is no parser;
//! responses are the only JSON this crate produces.
use chrono::{DateTime, FixedOffset, Local, Utc};

/// Implement to let a type serialize itself as a JSON object. The returned
/// pairs are written in order.
///
/// # Example
/// ```
/// use expresso::json::{Json, ToJsonObject};
///
/// struct Person {
///     name: String,
/// }
///
/// impl ToJsonObject for Person {
///     fn to_json_object(&self) -> Vec<(String, Json)> {
///         vec![("name".to_string(), Json::from(&self.name[..]))]
///     }
/// }
///
/// let person = Person { name: "Ada".to_string() };
/// assert_eq!(Json::from_object(&person).stringify(), r#"{"name":"Ada"}"#);
/// ```
pub trait ToJsonObject {
    fn to_json_object(&self) -> Vec<(String, Json)>;
}

/// A JSON value. Object keys and array elements keep insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum Json {
    Null,
    Str(String),
    Timestamp(DateTime<FixedOffset>),
    Array(Vec<Json>),
    Object(Vec<(String, Json)>),
}

impl Json {
    /// Empty object, to be filled with [`Json::with`].
    pub fn object() -> Self {
        Json::Object(vec![])
    }
    /// Empty array, to be filled with [`Json::push`].
    pub fn array() -> Self {
        Json::Array(vec![])
    }
    /// Serialize a value through its [`ToJsonObject`] capability.
    pub fn from_object<T: ToJsonObject>(value: &T) -> Self {
        Json::Object(value.to_json_object())
    }
    /// Append a key-value pair. No-op on non-objects.
    pub fn with<V: Into<Json>>(mut self, key: &str, value: V) -> Self {
        if let Json::Object(pairs) = &mut self {
            pairs.push((key.to_string(), value.into()));
        }
        self
    }
    /// Append an element. No-op on non-arrays.
    pub fn push<V: Into<Json>>(mut self, value: V) -> Self {
        if let Json::Array(items) = &mut self {
            items.push(value.into());
        }
        self
    }
    /// Write the value as compact JSON text.
    pub fn stringify(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }
    fn write(&self, out: &mut String) {
        match self {
            Json::Null => out.push_str("null"),
            Json::Str(s) => {
                out.push('"');
                escape_into(s, out);
                out.push('"');
            }
            Json::Timestamp(ts) => {
                out.push('"');
                // Millisecond precision with a numeric offset, never "Z".
                out.push_str(&ts.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string());
                out.push('"');
            }
            Json::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write(out);
                }
                out.push(']');
            }
            Json::Object(pairs) => {
                out.push('{');
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push('"');
                    escape_into(key, out);
                    out.push_str("\":");
                    value.write(out);
                }
                out.push('}');
            }
        }
    }
}

/// Escape special characters; non-ASCII becomes \uXXXX UTF-16 units.
fn escape_into(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            '\u{8}' => out.push_str("\\b"),
            ch if ch <= '\u{7f}' => out.push(ch),
            ch => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
}

impl From<&str> for Json {
    fn from(s: &str) -> Self {
        Json::Str(s.to_string())
    }
}

impl From<String> for Json {
    fn from(s: String) -> Self {
        Json::Str(s)
    }
}

impl From<DateTime<FixedOffset>> for Json {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        Json::Timestamp(ts)
    }
}

impl From<DateTime<Utc>> for Json {
    fn from(ts: DateTime<Utc>) -> Self {
        Json::Timestamp(ts.into())
    }
}

impl From<DateTime<Local>> for Json {
    fn from(ts: DateTime<Local>) -> Self {
        Json::Timestamp(ts.into())
    }
}

impl From<Vec<Json>> for Json {
    fn from(items: Vec<Json>) -> Self {
        Json::Array(items)
    }
}

impl From<Vec<(String, Json)>> for Json {
    fn from(pairs: Vec<(String, Json)>) -> Self {
        Json::Object(pairs)
    }
}

impl<T: Into<Json>> From<Option<T>> for Json {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Json::Null,
        }
    }
}

// Scalars without a native JSON shape go through their text representation.
macro_rules! json_from_display {
    ( $( $t:ty ),* ) => {
        $(
            impl From<$t> for Json {
                fn from(value: $t) -> Self {
                    Json::Str(value.to_string())
                }
            }
        )*
    };
}

json_from_display!(bool, i32, i64, u32, u64, usize, f32, f64);
