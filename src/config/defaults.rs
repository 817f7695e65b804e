use super::{Method, RequestConfig, ValidateStatus};
use crate::data::{default_request_transformer, default_response_transformer, Transformers};
use crate::headers::Headers;

pub(super) const ACCEPT: &str = "application/json, text/plain, */*";
pub(super) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub(super) fn defaults() -> RequestConfig {
    let mut headers = Headers::default();
    headers.common_mut().insert("Accept", ACCEPT);
    for method in Method::ALL {
        let partition = headers.method_mut(method);
        if method.has_body() {
            partition.insert("Content-Type", FORM_CONTENT_TYPE);
        }
    }

    RequestConfig {
        method: Some(Method::Get),
        timeout: Some(std::time::Duration::ZERO),
        headers: Some(headers),
        transform_request: Some(Transformers::from_fn(default_request_transformer)),
        transform_response: Some(Transformers::from_fn(default_response_transformer)),
        xsrf_cookie_name: Some("XSRF-TOKEN".into()),
        xsrf_header_name: Some("X-XSRF-TOKEN".into()),
        validate_status: Some(ValidateStatus::success()),
        ..Default::default()
    }
}
