//! Request and response payloads, and the transformer chains applied to them.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::headers::HeaderSet;
use crate::DebugLiteral;

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// A request or response payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Data {
    /// No payload.
    #[default]
    Empty,

    /// Text, sent as-is.
    Text(String),

    /// Raw bytes, sent as-is.
    Bytes(Bytes),

    /// Structured data. The default request transformer serializes it to JSON text.
    Json(serde_json::Value),

    /// Form fields, sent `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

impl Data {
    /// Serialize any value into structured data.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Data::Json)
    }

    /// Whether there is no payload.
    pub fn is_empty(&self) -> bool {
        matches!(self, Data::Empty)
    }

    /// The structured value, if this is JSON data.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Data::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The text, if this is text data.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Data::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The bytes, if this is binary data.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Data::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deserialize the payload, parsing text or bytes as JSON when needed.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Data::Json(value) => T::deserialize(value),
            Data::Text(text) => serde_json::from_str(text),
            Data::Bytes(bytes) => serde_json::from_slice(bytes),
            Data::Empty => serde_json::from_str("null"),
            Data::Form(fields) => serde_json::to_value(fields).and_then(serde_json::from_value),
        }
    }

    /// Encode as a request body. `None` means no body is sent.
    pub(crate) fn into_body(self) -> Result<Option<Bytes>, serde_urlencoded::ser::Error> {
        Ok(match self {
            Data::Empty => None,
            Data::Text(text) => Some(Bytes::from(text)),
            Data::Bytes(bytes) => Some(bytes),
            Data::Json(value) => Some(Bytes::from(value.to_string())),
            Data::Form(fields) => Some(Bytes::from(serde_urlencoded::to_string(&fields)?)),
        })
    }
}

impl From<&str> for Data {
    fn from(text: &str) -> Self {
        Data::Text(text.to_owned())
    }
}

impl From<String> for Data {
    fn from(text: String) -> Self {
        Data::Text(text)
    }
}

impl From<Bytes> for Data {
    fn from(bytes: Bytes) -> Self {
        Data::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data::Bytes(bytes.into())
    }
}

impl From<serde_json::Value> for Data {
    fn from(value: serde_json::Value) -> Self {
        Data::Json(value)
    }
}

type TransformFn = dyn Fn(Data, &mut HeaderSet) -> Data + Send + Sync;

/// A single payload transformer.
///
/// Transformers receive the payload produced by the previous transformer and the
/// headers of the message, which they may modify.
#[derive(Clone)]
pub struct Transformer(Arc<TransformFn>);

impl Transformer {
    /// Wrap a transformer function.
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(Data, &mut HeaderSet) -> Data + Send + Sync + 'static,
    {
        Self(Arc::new(transform))
    }

    /// Apply the transformer.
    pub fn call(&self, data: Data, headers: &mut HeaderSet) -> Data {
        (self.0)(data, headers)
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transformer")
            .field(&DebugLiteral("<fn>"))
            .finish()
    }
}

impl PartialEq for Transformer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// An ordered chain of [`Transformer`]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformers(Vec<Transformer>);

impl Transformers {
    /// An empty chain, which leaves payloads untouched.
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain of one function.
    pub fn from_fn<F>(transform: F) -> Self
    where
        F: Fn(Data, &mut HeaderSet) -> Data + Send + Sync + 'static,
    {
        Self(vec![Transformer::new(transform)])
    }

    /// Append a transformer to the end of the chain.
    pub fn push(&mut self, transformer: impl Into<Transformer>) {
        self.0.push(transformer.into());
    }

    /// Builder form of [`push`](Self::push).
    pub fn then<F>(mut self, transform: F) -> Self
    where
        F: Fn(Data, &mut HeaderSet) -> Data + Send + Sync + 'static,
    {
        self.push(Transformer::new(transform));
        self
    }

    /// Number of transformers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the transformers in order.
    pub fn iter(&self) -> impl Iterator<Item = &Transformer> {
        self.0.iter()
    }
}

impl From<Transformer> for Transformers {
    fn from(transformer: Transformer) -> Self {
        Self(vec![transformer])
    }
}

impl From<Vec<Transformer>> for Transformers {
    fn from(transformers: Vec<Transformer>) -> Self {
        Self(transformers)
    }
}

impl FromIterator<Transformer> for Transformers {
    fn from_iter<I: IntoIterator<Item = Transformer>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Run `data` through each transformer in order. Without transformers the
/// payload is returned unchanged.
pub fn transform(data: Data, headers: &mut HeaderSet, transformers: Option<&Transformers>) -> Data {
    let Some(transformers) = transformers else {
        return data;
    };

    transformers
        .iter()
        .fold(data, |data, transformer| transformer.call(data, headers))
}

/// Serializes structured data to JSON text, stamping `Content-Type` when unset.
/// Other payloads pass through.
pub fn default_request_transformer(data: Data, headers: &mut HeaderSet) -> Data {
    headers.normalize_name("Content-Type");

    match data {
        Data::Json(value) => {
            if !headers.contains("Content-Type") {
                headers.insert("Content-Type", JSON_CONTENT_TYPE);
            }
            Data::Text(value.to_string())
        }
        other => other,
    }
}

/// Parses text as JSON when possible. Text which is not JSON is returned unchanged.
pub fn default_response_transformer(data: Data, _headers: &mut HeaderSet) -> Data {
    match data {
        Data::Text(text) => match serde_json::from_str(&text) {
            Ok(value) => Data::Json(value),
            Err(_) => Data::Text(text),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn transformers_run_in_order() {
        let chain = Transformers::new()
            .then(|data, _| match data {
                Data::Text(text) => Data::Text(format!("{text}-a")),
                other => other,
            })
            .then(|data, headers| {
                headers.insert("X-Seen", "b");
                match data {
                    Data::Text(text) => Data::Text(format!("{text}-b")),
                    other => other,
                }
            });

        let mut headers = HeaderSet::new();
        let data = transform(Data::from("start"), &mut headers, Some(&chain));
        assert_eq!(data, Data::from("start-a-b"));
        assert_eq!(headers.get("x-seen"), Some("b"));
    }

    #[test]
    fn missing_transformers_are_identity() {
        let mut headers = HeaderSet::new();
        let data = transform(Data::from("x"), &mut headers, None);
        assert_eq!(data, Data::from("x"));
        assert!(headers.is_empty());
    }

    #[test]
    fn request_transformer_serializes_json() {
        let mut headers = HeaderSet::new();
        let data = default_request_transformer(Data::Json(json!({"a": 1})), &mut headers);
        assert_eq!(data, Data::from(r#"{"a":1}"#));
        assert_eq!(headers.get("Content-Type"), Some(JSON_CONTENT_TYPE));
    }

    #[test]
    fn request_transformer_keeps_explicit_content_type() {
        let mut headers: HeaderSet = [("content-type", "application/vnd.api+json")]
            .into_iter()
            .collect();
        let data = default_request_transformer(Data::Json(json!([1, 2])), &mut headers);
        assert_eq!(data, Data::from("[1,2]"));
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![("Content-Type", "application/vnd.api+json")]
        );
    }

    #[test]
    fn request_transformer_passes_other_payloads() {
        let mut headers = HeaderSet::new();
        let data = default_request_transformer(Data::from("foo=bar"), &mut headers);
        assert_eq!(data, Data::from("foo=bar"));
        assert!(headers.is_empty());

        let form = Data::Form(vec![("foo".into(), "bar".into())]);
        assert_eq!(default_request_transformer(form.clone(), &mut headers), form);
    }

    #[test]
    fn response_transformer_parses_json_text() {
        let mut headers = HeaderSet::new();
        let data = default_response_transformer(Data::from(r#"{"a":2}"#), &mut headers);
        assert_eq!(data, Data::Json(json!({"a": 2})));
    }

    #[test]
    fn response_transformer_keeps_invalid_json() {
        let mut headers = HeaderSet::new();
        let data = default_response_transformer(Data::from("{a: 2"), &mut headers);
        assert_eq!(data, Data::from("{a: 2"));
    }

    #[test]
    fn form_body_is_urlencoded() {
        let body = Data::Form(vec![("a b".into(), "c&d".into())])
            .into_body()
            .unwrap()
            .unwrap();
        assert_eq!(body, Bytes::from_static(b"a+b=c%26d"));
        assert_eq!(Data::Empty.into_body().unwrap(), None);
    }

    #[test]
    fn deserialize_json_payloads() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Point {
            x: i32,
        }

        assert_eq!(
            Data::Json(json!({"x": 1})).deserialize::<Point>().unwrap(),
            Point { x: 1 }
        );
        assert_eq!(
            Data::from(r#"{"x": 2}"#).deserialize::<Point>().unwrap(),
            Point { x: 2 }
        );
    }
}
