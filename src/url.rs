//! URL building: base URL resolution, query parameters and origin checks.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::config::ParamsSerializer;

/// Characters escaped in query keys and values.
///
/// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )` is escaped, except `@ : $ , [ ]`
/// which are kept readable. Spaces are handled separately.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'@')
    .remove(b':')
    .remove(b'$')
    .remove(b',')
    .remove(b'[')
    .remove(b']');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY)
        .to_string()
        .replace("%20", "+")
}

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Skipped when building the query.
    Null,

    /// Sent as-is.
    Text(String),

    /// Sent as an ISO-8601 timestamp.
    Date(DateTime<Utc>),

    /// Scalars are sent as their literal, objects and arrays as JSON text.
    Json(serde_json::Value),

    /// Sent as repeated `key[]=value` pairs.
    List(Vec<ParamValue>),
}

impl ParamValue {
    fn serialize(&self) -> Option<String> {
        match self {
            ParamValue::Null | ParamValue::Json(serde_json::Value::Null) => None,
            ParamValue::Text(text) => Some(text.clone()),
            ParamValue::Date(date) => Some(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ParamValue::Json(serde_json::Value::String(text)) => Some(text.clone()),
            ParamValue::Json(value) => Some(value.to_string()),
            ParamValue::List(values) => Some(
                serde_json::Value::Array(
                    values
                        .iter()
                        .filter_map(ParamValue::serialize)
                        .map(serde_json::Value::String)
                        .collect(),
                )
                .to_string(),
            ),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        ParamValue::Date(value)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParamValue::Null,
            serde_json::Value::String(text) => ParamValue::Text(text),
            serde_json::Value::Array(values) => {
                ParamValue::List(values.into_iter().map(ParamValue::from).collect())
            }
            other => ParamValue::Json(other),
        }
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

macro_rules! param_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Json(serde_json::Value::from(value))
                }
            }
        )*
    };
}

param_from_scalar!(bool, i32, i64, u32, u64, f64);

/// Ordered query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    /// No parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up the first parameter named `key`.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Iterate over parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as a query string, without the leading `?`.
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        for (key, value) in self.iter() {
            match value {
                ParamValue::Null => {}
                ParamValue::List(values) => {
                    let key = encode(&format!("{key}[]"));
                    for value in values {
                        if let Some(value) = value.serialize() {
                            parts.push(format!("{key}={}", encode(&value)));
                        }
                    }
                }
                value => {
                    if let Some(value) = value.serialize() {
                        parts.push(format!("{}={}", encode(key), encode(&value)));
                    }
                }
            }
        }
        parts.join("&")
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Append `params` to `url`.
///
/// A caller supplied serializer replaces the built-in encoding. Any `#fragment` is
/// dropped, and `&` is used instead of `?` when the URL already has a query.
pub fn build_url(url: &str, params: Option<&Params>, serializer: Option<&ParamsSerializer>) -> String {
    let Some(params) = params else {
        return url.to_owned();
    };

    let query = match serializer {
        Some(serializer) => serializer.serialize(params),
        None => params.to_query(),
    };

    if query.is_empty() {
        return url.to_owned();
    }

    let base = url.split_once('#').map_or(url, |(base, _)| base);
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}

/// Whether `url` is absolute (`scheme://...`) or protocol relative (`//...`).
pub fn is_absolute_url(url: &str) -> bool {
    let Some(idx) = url.find("//") else {
        return false;
    };

    let prefix = &url[..idx];
    if prefix.is_empty() {
        return true;
    }

    let Some(scheme) = prefix.strip_suffix(':') else {
        return false;
    };

    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Join `base` and `relative` with exactly one `/`. An empty `relative` yields `base`.
pub fn combine_url(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_owned();
    }

    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Resolve `url` against `base_url` unless it is already absolute.
pub fn resolve_url(base_url: Option<&str>, url: &str) -> String {
    match base_url {
        Some(base) if !is_absolute_url(url) => combine_url(base, url),
        _ => url.to_owned(),
    }
}

/// The scheme and authority a client considers its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    scheme: String,
    authority: String,
}

impl Origin {
    /// Build an origin from its parts.
    pub fn new(scheme: impl Into<String>, authority: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            authority: authority.into().to_ascii_lowercase(),
        }
    }

    /// Extract the origin of an absolute URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let uri: http::Uri = url.parse().ok()?;
        Some(Self::new(uri.scheme_str()?, uri.authority()?.as_str()))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

/// Whether `url` targets `origin`.
///
/// Relative URLs are always same-origin. Absolute URLs must match the scheme and
/// authority; without a known origin they never match.
pub fn is_same_origin(url: &str, origin: Option<&Origin>) -> bool {
    if !is_absolute_url(url) {
        return true;
    }

    match (Origin::from_url(url), origin) {
        (Some(target), Some(origin)) => &target == origin,
        _ => false,
    }
}
