//! Header sets and method-partitioned request headers.
//!
//! A [`HeaderSet`] is a flat, ordered, case-insensitive mapping of header names to
//! values which preserves the casing it was given. [`Headers`] is the configuration
//! form: a `common` partition, one partition per [`Method`], and method independent
//! top-level headers. [`Headers::flatten`] collapses it for one method.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::Method;

/// Ordered, case-insensitive header mapping.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// Look up a header, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    /// Whether a header is present, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Set a header. An existing header with the same name (ignoring case) is
    /// replaced in place, taking the new name's casing.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Remove a header, ignoring case, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name)
            .map(|idx| self.entries.remove(idx).1)
    }

    /// Rename any header matching `canonical` case-insensitively to exactly `canonical`.
    pub fn normalize_name(&mut self, canonical: &str) {
        for (name, _) in self.entries.iter_mut() {
            if name != canonical && name.eq_ignore_ascii_case(canonical) {
                *name = canonical.to_owned();
            }
        }
    }

    /// Overlay `other` on top of this set. Later values win.
    pub fn extend_from(&mut self, other: &HeaderSet) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to an [`http::HeaderMap`].
    pub fn to_header_map(&self) -> Result<http::HeaderMap, http::Error> {
        let mut map = http::HeaderMap::with_capacity(self.len());
        for (name, value) in self.iter() {
            let name = http::HeaderName::from_bytes(name.as_bytes())?;
            let value = http::HeaderValue::from_str(value)?;
            map.append(name, value);
        }
        Ok(map)
    }
}

impl fmt::Debug for HeaderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = HeaderSet::new();
        for (name, value) in iter {
            set.insert(name, value);
        }
        set
    }
}

impl From<&http::HeaderMap> for HeaderSet {
    /// Repeated headers are joined with `", "`. Values which are not visible ASCII
    /// are decoded lossily.
    fn from(map: &http::HeaderMap) -> Self {
        let mut set = HeaderSet::new();
        for name in map.keys() {
            let value = map
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            set.insert(name.as_str(), value);
        }
        set
    }
}

/// Request headers as configured: `common`, per-method partitions, and top-level headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    common: HeaderSet,
    methods: BTreeMap<Method, HeaderSet>,
    top: HeaderSet,
}

impl Headers {
    /// Headers sent with every method.
    pub fn common(&self) -> &HeaderSet {
        &self.common
    }

    /// Mutable access to the `common` partition.
    pub fn common_mut(&mut self) -> &mut HeaderSet {
        &mut self.common
    }

    /// Headers sent only with `method`, if that partition exists.
    pub fn method(&self, method: Method) -> Option<&HeaderSet> {
        self.methods.get(&method)
    }

    /// Mutable access to the partition for `method`, creating it if needed.
    pub fn method_mut(&mut self, method: Method) -> &mut HeaderSet {
        self.methods.entry(method).or_default()
    }

    /// Method independent headers, which win over both partitions when flattening.
    pub fn top(&self) -> &HeaderSet {
        &self.top
    }

    /// Mutable access to the top-level headers.
    pub fn top_mut(&mut self) -> &mut HeaderSet {
        &mut self.top
    }

    /// Set a top-level header.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.top.insert(name, value)
    }

    /// Merge `over` on top of `base` into a new value. Each partition is merged
    /// key by key, with `over` winning on conflicts.
    pub fn deep_merge(base: &Headers, over: &Headers) -> Headers {
        let mut merged = base.clone();
        merged.common.extend_from(&over.common);
        for (method, partition) in &over.methods {
            merged.method_mut(*method).extend_from(partition);
        }
        merged.top.extend_from(&over.top);
        merged
    }

    /// Collapse into the headers sent for `method`: `common`, then the method's
    /// partition, then the top-level headers. Partitions of other methods are dropped.
    pub fn flatten(&self, method: Method) -> HeaderSet {
        let mut flat = self.common.clone();
        if let Some(partition) = self.methods.get(&method) {
            flat.extend_from(partition);
        }
        flat.extend_from(&self.top);
        flat
    }
}

impl From<HeaderSet> for Headers {
    fn from(top: HeaderSet) -> Self {
        Headers {
            top,
            ..Default::default()
        }
    }
}

/// Flatten optional headers for `method`; absent headers stay absent.
pub fn flatten_headers(headers: Option<&Headers>, method: Method) -> Option<HeaderSet> {
    headers.map(|headers| headers.flatten(method))
}
