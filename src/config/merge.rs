//! Merging client defaults with per-call configuration.
//!
//! Each field of [`RequestConfig`] is merged with exactly one [`MergeStrategy`],
//! chosen by [`Field::strategy`].

use std::time::Duration;

use super::{
    BasicAuth, Method, ParamsSerializer, ProgressHandler, RequestConfig, ResponseType,
    ValidateStatus,
};
use crate::cancel::CancelToken;
use crate::data::{Data, Transformers};
use crate::headers::Headers;
use crate::url::Params;

/// How a single field is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Only the override is used; defaults are ignored.
    OverrideOnly,

    /// The override is merged over a copy of the default.
    Structural,

    /// The override is used if present, otherwise the default.
    OverrideWithFallback,
}

/// The fields of a [`RequestConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Field {
    Url,
    Method,
    BaseUrl,
    Data,
    Params,
    Headers,
    Timeout,
    ResponseType,
    CancelToken,
    WithCredentials,
    XsrfCookieName,
    XsrfHeaderName,
    OnUploadProgress,
    OnDownloadProgress,
    Auth,
    ValidateStatus,
    ParamsSerializer,
    TransformRequest,
    TransformResponse,
    /// Any key stored in [`RequestConfig::extensions`].
    Extension,
}

impl Field {
    /// The strategy used to merge this field.
    pub const fn strategy(self) -> MergeStrategy {
        match self {
            Field::Url | Field::Data | Field::Params => MergeStrategy::OverrideOnly,
            Field::Headers | Field::Auth => MergeStrategy::Structural,
            _ => MergeStrategy::OverrideWithFallback,
        }
    }
}

/// Values which can be combined structurally.
///
/// The default implementation lets the override replace the default entirely,
/// which is the right behavior for anything that is not a mapping.
pub trait Merge: Clone {
    /// Merge `over` on top of `self`, producing a new value.
    fn merge(&self, over: &Self) -> Self {
        over.clone()
    }
}

impl Merge for String {}
impl Merge for bool {}
impl Merge for Duration {}
impl Merge for Method {}
impl Merge for ResponseType {}
impl Merge for Data {}
impl Merge for Params {}
impl Merge for CancelToken {}
impl Merge for ProgressHandler {}
impl Merge for ValidateStatus {}
impl Merge for ParamsSerializer {}
impl Merge for Transformers {}
impl Merge for serde_json::Value {}

// Credentials have no optional parts, so the override always wins as a whole.
impl Merge for BasicAuth {}

impl Merge for Headers {
    fn merge(&self, over: &Self) -> Self {
        Headers::deep_merge(self, over)
    }
}

fn merge_field<T: Merge>(field: Field, default: Option<&T>, over: Option<&T>) -> Option<T> {
    match field.strategy() {
        MergeStrategy::OverrideOnly => over.cloned(),
        MergeStrategy::OverrideWithFallback => over.or(default).cloned(),
        MergeStrategy::Structural => match (default, over) {
            (Some(default), Some(over)) => Some(default.merge(over)),
            (None, Some(over)) => Some(over.clone()),
            (default, None) => default.cloned(),
        },
    }
}

/// Merge `default` with `over`, producing a new effective configuration.
///
/// Neither input is modified, and the result owns all of its containers.
pub fn merge_config(default: &RequestConfig, over: &RequestConfig) -> RequestConfig {
    macro_rules! merge {
        ($field:ident, $kind:ident) => {
            merge_field(
                Field::$kind,
                default.$field.as_ref(),
                over.$field.as_ref(),
            )
        };
    }

    let mut extensions = default.extensions.clone();
    for (key, value) in &over.extensions {
        let merged = merge_field(Field::Extension, extensions.get(key), Some(value));
        if let Some(merged) = merged {
            extensions.insert(key.clone(), merged);
        }
    }

    RequestConfig {
        url: merge!(url, Url),
        method: merge!(method, Method),
        base_url: merge!(base_url, BaseUrl),
        data: merge!(data, Data),
        params: merge!(params, Params),
        headers: merge!(headers, Headers),
        timeout: merge!(timeout, Timeout),
        response_type: merge!(response_type, ResponseType),
        cancel_token: merge!(cancel_token, CancelToken),
        with_credentials: merge!(with_credentials, WithCredentials),
        xsrf_cookie_name: merge!(xsrf_cookie_name, XsrfCookieName),
        xsrf_header_name: merge!(xsrf_header_name, XsrfHeaderName),
        on_upload_progress: merge!(on_upload_progress, OnUploadProgress),
        on_download_progress: merge!(on_download_progress, OnDownloadProgress),
        auth: merge!(auth, Auth),
        validate_status: merge!(validate_status, ValidateStatus),
        params_serializer: merge!(params_serializer, ParamsSerializer),
        transform_request: merge!(transform_request, TransformRequest),
        transform_response: merge!(transform_response, TransformResponse),
        extensions,
    }
}
