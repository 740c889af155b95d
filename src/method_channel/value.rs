/// A value carried over a method channel, mirroring the types the Flutter
/// standard message codec can represent.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EncodableValue {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Uint8List(Vec<u8>),
    Int32List(Vec<i32>),
    Int64List(Vec<i64>),
    Float32List(Vec<f32>),
    Float64List(Vec<f64>),
    List(Vec<EncodableValue>),
    /// Keys keep their wire order; any value may be a key.
    Map(Vec<(EncodableValue, EncodableValue)>),
}

impl EncodableValue {
    pub fn is_null(&self) -> bool {
        matches!(self, EncodableValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EncodableValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(EncodableValue, EncodableValue)]> {
        match self {
            EncodableValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a string key in a map value. Returns `None` for non-maps.
    pub fn lookup(&self, key: &str) -> Option<&EncodableValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Builds a map keyed by strings.
    pub fn string_map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<EncodableValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        EncodableValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (EncodableValue::String(k.into()), v.into()))
                .collect(),
        )
    }
}

impl From<bool> for EncodableValue {
    fn from(v: bool) -> Self {
        EncodableValue::Bool(v)
    }
}

impl From<i32> for EncodableValue {
    fn from(v: i32) -> Self {
        EncodableValue::Int32(v)
    }
}

impl From<i64> for EncodableValue {
    fn from(v: i64) -> Self {
        EncodableValue::Int64(v)
    }
}

impl From<f64> for EncodableValue {
    fn from(v: f64) -> Self {
        EncodableValue::Float64(v)
    }
}

impl From<&str> for EncodableValue {
    fn from(v: &str) -> Self {
        EncodableValue::String(v.to_owned())
    }
}

impl From<String> for EncodableValue {
    fn from(v: String) -> Self {
        EncodableValue::String(v)
    }
}

impl From<Vec<EncodableValue>> for EncodableValue {
    fn from(v: Vec<EncodableValue>) -> Self {
        EncodableValue::List(v)
    }
}
