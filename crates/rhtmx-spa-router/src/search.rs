//! Query-string codec
//!
//! Maps a query string to a structured mapping where a key seen once holds a
//! single value and a key seen repeatedly holds the ordered list of values.
//!
//! A one-element list encodes exactly like a scalar and therefore decodes
//! back to a scalar. This collapse is intentional and kept for
//! compatibility with plain `URLSearchParams` handling.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value of a single search-param key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchValue {
    Single(String),
    Multi(Vec<String>),
}

impl SearchValue {
    /// First value (the only one for `Single`)
    pub fn first(&self) -> Option<&str> {
        match self {
            SearchValue::Single(value) => Some(value),
            SearchValue::Multi(values) => values.first().map(String::as_str),
        }
    }

    /// All values in order
    pub fn values(&self) -> Vec<&str> {
        match self {
            SearchValue::Single(value) => vec![value.as_str()],
            SearchValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Adds another occurrence, promoting a scalar to a list
    fn push(&mut self, value: String) {
        match self {
            SearchValue::Single(first) => {
                let first = std::mem::take(first);
                *self = SearchValue::Multi(vec![first, value]);
            }
            SearchValue::Multi(values) => values.push(value),
        }
    }
}

impl From<&str> for SearchValue {
    fn from(value: &str) -> Self {
        SearchValue::Single(value.to_string())
    }
}

impl From<String> for SearchValue {
    fn from(value: String) -> Self {
        SearchValue::Single(value)
    }
}

impl From<Vec<String>> for SearchValue {
    fn from(values: Vec<String>) -> Self {
        SearchValue::Multi(values)
    }
}

impl From<Vec<&str>> for SearchValue {
    fn from(values: Vec<&str>) -> Self {
        SearchValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Decoded search params of a location
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::decode;
///
/// let params = decode("?q=a+b&tag=x&tag=y");
/// assert_eq!(params.first("q"), Some("a b"));
/// assert_eq!(params.get_all("tag"), vec!["x", "y"]);
/// assert_eq!(params.to_query_string(), "q=a%20b&tag=x&tag=y");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchParams(BTreeMap<String, SearchValue>);

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&SearchValue> {
        self.0.get(key)
    }

    /// First value for `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(SearchValue::first)
    }

    /// Every value for `key` (empty when absent)
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0.get(key).map(SearchValue::values).unwrap_or_default()
    }

    /// First value for `key` parsed as `T`
    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.first(key)?.parse().ok()
    }

    /// Replaces the value for `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SearchValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Adds an occurrence of `key` the way a query string repeats it
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                self.0.insert(key, SearchValue::Single(value));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<SearchValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SearchValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Shallow-merges `patch` into these params; absent markers delete keys
    pub fn merge(&mut self, patch: &SearchPatch) {
        for (key, value) in patch.iter() {
            match value {
                Some(value) => {
                    self.0.insert(key.to_string(), value.clone());
                }
                None => {
                    self.0.remove(key);
                }
            }
        }
    }

    /// Encodes to a query string without a leading `?`
    pub fn to_query_string(&self) -> String {
        encode(self.iter().map(|(k, v)| (k, Some(v))))
    }
}

impl<K: Into<String>, V: Into<SearchValue>> FromIterator<(K, V)> for SearchParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A search-param mutation where `None` marks a key for deletion
///
/// # Examples
///
/// ```
/// use rhtmx_spa_router::SearchPatch;
///
/// let patch = SearchPatch::new().set("sort", "name").remove("page");
/// assert_eq!(patch.to_query_string(), "sort=name");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPatch(BTreeMap<String, Option<SearchValue>>);

impl SearchPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<SearchValue>) -> Self {
        self.0.insert(key.into(), Some(value.into()));
        self
    }

    /// Marks `key` for deletion
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.0.insert(key.into(), None);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&SearchValue>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// The params this patch describes on its own, absent markers dropped
    pub fn into_params(self) -> SearchParams {
        SearchParams(
            self.0
                .into_iter()
                .filter_map(|(k, v)| v.map(|v| (k, v)))
                .collect(),
        )
    }

    /// Encodes to a query string; absent markers are omitted
    pub fn to_query_string(&self) -> String {
        encode(self.iter())
    }
}

impl From<SearchParams> for SearchPatch {
    fn from(params: SearchParams) -> Self {
        Self(params.0.into_iter().map(|(k, v)| (k, Some(v))).collect())
    }
}

/// Decodes a query string (leading `?` optional)
///
/// `+` decodes to a space; pieces without `=` decode to an empty value;
/// malformed percent-escapes are kept verbatim.
pub fn decode(query: &str) -> SearchParams {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = SearchParams::new();

    for piece in query.split('&').filter(|piece| !piece.is_empty()) {
        let (key, value) = piece.split_once('=').unwrap_or((piece, ""));
        params.append(decode_component(key), decode_component(value));
    }

    params
}

/// Encodes entries to a query string without a leading `?`
///
/// `None` entries are omitted; lists expand to repeated `key=value` pairs
/// in list order.
pub fn encode<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a SearchValue>)>,
{
    let mut pairs = Vec::new();

    for (key, value) in entries {
        let Some(value) = value else { continue };
        let key = urlencoding::encode(key);
        for item in value.values() {
            pairs.push(format!("{}={}", key, urlencoding::encode(item)));
        }
    }

    pairs.join("&")
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
