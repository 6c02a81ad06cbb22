use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Result payload delivered by the login provider.
///
/// Kept as the ordered list of pairs from the redirect query. Repeated keys
/// are preserved. The broker never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContent {
    pairs: Vec<(String, String)>,
}

impl SessionContent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SessionContent {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Serializes as `{"key": ["v1", "v2"], ...}` with keys in first-appearance order.
impl Serialize for SessionContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.pairs {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
        let mut map = serializer.serialize_map(Some(keys.len()))?;
        for key in keys {
            let values: Vec<&str> = self
                .pairs
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .collect();
            map.serialize_entry(key, &values)?;
        }
        map.end()
    }
}
