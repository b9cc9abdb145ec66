//! Typed values
//!
//! The self-describing tagged union carried in every message.

/// A value on the wire: unsigned integer, binary string or ordered mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    /// 32-bit unsigned integer
    Integer(u32),

    /// Raw bytes (may contain NUL, no terminator)
    Binary(Vec<u8>),

    /// Ordered string-keyed mapping
    Map(Map),
}

impl TypedValue {
    /// Get the integer, if this is one
    pub fn as_integer(&self) -> Option<u32> {
        match self {
            TypedValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the bytes, if this is a binary string
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            TypedValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Get the mapping, if this is one
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            TypedValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<u32> for TypedValue {
    fn from(n: u32) -> Self {
        TypedValue::Integer(n)
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(bytes: Vec<u8>) -> Self {
        TypedValue::Binary(bytes)
    }
}

impl From<&[u8]> for TypedValue {
    fn from(bytes: &[u8]) -> Self {
        TypedValue::Binary(bytes.to_vec())
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::Binary(s.as_bytes().to_vec())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::Binary(s.into_bytes())
    }
}

impl From<Map> for TypedValue {
    fn from(map: Map) -> Self {
        TypedValue::Map(map)
    }
}

/// Insertion-ordered mapping with unique keys
///
/// Entry order is what gets encoded, so two maps with the same entries in a
/// different order serialize (and sign) differently. Maps are small, so
/// lookups are linear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Map {
    entries: Vec<(String, TypedValue)>,
}

impl Map {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing an existing entry in place
    ///
    /// Returns the previous value for the key, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TypedValue>) -> Option<TypedValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a value by key
    pub fn get(&self, key: &str) -> Option<&TypedValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Remove an entry, preserving the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<TypedValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sort entries by key (for callers needing a canonical order)
    pub fn sort_keys(&mut self) {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
    }
}

impl<K: Into<String>, V: Into<TypedValue>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
