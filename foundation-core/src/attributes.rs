//! Insertion-ordered attribute maps.

use crate::value::Value;
use std::fmt;
use std::iter::FromIterator;

/// A map of attribute names to [`Value`]s that preserves insertion order.
///
/// Log records carry few attributes, so the map is vector-backed; lookups
/// are linear and inserts keep the position of an existing key.
#[derive(Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: Vec<(String, Value)>,
}

impl AttributeMap {
    /// Returns an empty map.
    pub fn new() -> Self {
        AttributeMap {
            entries: Vec::new(),
        }
    }

    /// Returns an empty map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        AttributeMap {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Inserts a value, replacing (in place) any existing entry for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Inserts a value only if `key` is not already present.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if !self.contains_key(&key) {
            self.entries.push((key, value.into()));
        }
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Looks up a value mutably by key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// True if the map contains `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates entries mutably in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Merges `other` into `self`; keys from `other` win.
    pub fn extend(&mut self, other: &AttributeMap) {
        for (k, v) in other.iter() {
            self.insert(k, v.clone());
        }
    }

    /// Converts the map into a [`Value::Map`].
    pub fn into_value(self) -> Value {
        Value::Map(self.entries)
    }
}

impl fmt::Debug for AttributeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl FromIterator<(String, Value)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = AttributeMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for AttributeMap {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl serde::Serialize for AttributeMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Builds an [`AttributeMap`] from `key => value` pairs.
///
/// ```
/// use foundation_core::attrs;
///
/// let attributes = attrs! {
///     "table" => "users",
///     "rows" => 42,
/// };
/// assert_eq!(attributes.get("table").and_then(|v| v.as_str()), Some("users"));
/// ```
#[macro_export]
macro_rules! attrs {
    () => { $crate::AttributeMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::AttributeMap::new();
        $(
            map.insert($key, $value);
        )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_preserved() {
        let mut map = AttributeMap::new();
        map.insert("b", 1u64);
        map.insert("a", 2u64);
        map.insert("c", 3u64);
        let keys: Vec<_> = map.iter().map(|(k, _)| k.to_owned()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn reinsert_keeps_position() {
        let mut map = attrs! { "a" => 1, "b" => 2 };
        map.insert("a", 10);
        let entries: Vec<_> = map.iter().map(|(k, v)| (k.to_owned(), v.clone())).collect();
        assert_eq!(entries[0], ("a".to_owned(), Value::Int(10)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn serializes_as_ordered_map() {
        let map = attrs! { "z" => 1, "a" => "x" };
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"z":1,"a":"x"}"#);
    }
}
