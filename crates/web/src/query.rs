use serde::{Deserialize, Serialize};

/// Query string parsed into an ordered multimap. Duplicate keys keep every
/// value in arrival order, so `a=1&a=2` survives a parse/encode round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Parses a raw query string (no leading `?`). Undecodable input yields
    /// an empty mapping rather than an error.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        serde_urlencoded::from_str::<Vec<(String, String)>>(raw)
            .map(|pairs| Self { pairs })
            .unwrap_or_default()
    }

    /// Percent-encodes the mapping back into a query string.
    pub fn encode(&self) -> String {
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }

    /// First value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Every value for a key, in arrival order.
    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl From<Vec<(String, String)>> for Query {
    fn from(value: Vec<(String, String)>) -> Self {
        Self { pairs: value }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}
