use std::sync::Arc;

use courier::transport::{
    MockReply, MockTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
use courier::{Client, Data, Error, ErrorKind, Interceptor, Method, RequestConfig, Response};
use futures_util::future::BoxFuture;
use http::StatusCode;
use parking_lot::Mutex;
use serde_json::json;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
type Log = Arc<Mutex<Vec<String>>>;

/// Records when dispatch happens relative to the interceptors.
#[derive(Debug, Clone)]
struct Recording {
    log: Log,
    inner: MockTransport,
}

impl Transport for Recording {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        self.log.lock().push("dispatch".into());
        self.inner.send(request)
    }
}

fn request_stage(log: &Log, name: &str) -> Interceptor<RequestConfig> {
    let log = log.clone();
    let name = format!("{name}_req");
    Interceptor::new(move |config: RequestConfig| {
        log.lock().push(name.clone());
        async move { Ok(config) }
    })
}

fn response_stage(log: &Log, name: &str) -> Interceptor<Response> {
    let log = log.clone();
    let name = format!("{name}_resp");
    Interceptor::new(move |response: Response| {
        log.lock().push(name.clone());
        async move { Ok(response) }
    })
}

fn client(transport: &MockTransport) -> Client {
    Client::builder().with_transport(transport.clone()).build()
}

#[tokio::test]
async fn interceptor_order() -> Result<(), BoxError> {
    let log = Log::default();
    let client = Client::builder()
        .with_transport(Recording {
            log: log.clone(),
            inner: MockTransport::new(),
        })
        .build();

    for name in ["A", "B"] {
        client.interceptors().request.use_interceptor(request_stage(&log, name));
        client.interceptors().response.use_interceptor(response_stage(&log, name));
    }

    client.get("/foo", RequestConfig::default()).await?;
    assert_eq!(
        *log.lock(),
        ["B_req", "A_req", "dispatch", "A_resp", "B_resp"]
    );

    Ok(())
}

#[tokio::test]
async fn ejected_interceptors_do_not_run() -> Result<(), BoxError> {
    let log = Log::default();
    let transport = MockTransport::new();
    let client = client(&transport);

    let a = client.interceptors().request.use_interceptor(request_stage(&log, "A"));
    client.interceptors().request.use_interceptor(request_stage(&log, "B"));
    client.interceptors().request.use_interceptor(request_stage(&log, "C"));
    client.interceptors().request.eject(a);
    client.interceptors().request.eject(a);

    client.get("/foo", RequestConfig::default()).await?;
    assert_eq!(*log.lock(), ["C_req", "B_req"]);

    Ok(())
}

#[tokio::test]
async fn interceptors_can_rewrite_config_and_response() -> Result<(), BoxError> {
    let transport = MockTransport::new().with_reply(MockReply::json(200, &json!({"n": 1})));
    let client = client(&transport);

    client
        .interceptors()
        .request
        .use_interceptor(Interceptor::new(|config: RequestConfig| async move {
            Ok(config.with_header("X-Intercepted", "yes").with_param("page", 3))
        }));
    client
        .interceptors()
        .response
        .use_interceptor(Interceptor::new(|mut response: Response| async move {
            response.data = Data::from(json!({"wrapped": response.data.as_json().cloned()}));
            Ok(response)
        }));

    let response = client.get("/items", RequestConfig::default()).await?;
    assert_eq!(response.data.as_json(), Some(&json!({"wrapped": {"n": 1}})));

    let sent = transport.last_request().ok_or("no request")?;
    assert_eq!(sent.url, "/items?page=3");
    assert_eq!(sent.headers.get("x-intercepted"), Some("yes"));

    Ok(())
}

#[tokio::test]
async fn json_post_sets_content_type() -> Result<(), BoxError> {
    let transport = MockTransport::new().with_reply(MockReply::Echo);
    let client = client(&transport);

    let response = client
        .post("/foo", Some(json!({"a": 1}).into()), RequestConfig::default())
        .await?;

    let sent = transport.last_request().ok_or("no request")?;
    assert_eq!(sent.method, Method::Post);
    assert_eq!(
        sent.headers.get("Content-Type"),
        Some("application/json;charset=utf-8")
    );
    assert_eq!(sent.body.as_deref(), Some(&br#"{"a":1}"#[..]));

    #[derive(serde::Deserialize)]
    struct Echoed {
        a: u32,
    }
    assert_eq!(response.json::<Echoed>()?.a, 1);

    Ok(())
}

#[tokio::test]
async fn error_status_is_rejected() -> Result<(), BoxError> {
    let transport = MockTransport::new()
        .with_reply(MockReply::text(500, "boom"))
        .with_reply(MockReply::status(200));
    let client = client(&transport);

    let error = client
        .get("/broken", RequestConfig::default())
        .await
        .expect_err("500 is not a success");
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert_eq!(error.code(), Some("ERR_BAD_RESPONSE"));
    assert_eq!(error.message(), "Request failed with status code 500");
    let response = error.into_response().ok_or("no response")?;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.data.as_text(), Some("boom"));

    let error = client
        .get(
            "/fine",
            RequestConfig::new().with_validate_status(|status| status != StatusCode::OK),
        )
        .await
        .expect_err("custom rule rejects 200");
    assert_eq!(error.response().map(|r| r.status), Some(StatusCode::OK));

    Ok(())
}

#[tokio::test]
async fn custom_validation_accepts() -> Result<(), BoxError> {
    let transport = MockTransport::new().with_reply(MockReply::status(500));
    let client = client(&transport);

    let response = client
        .get(
            "/broken",
            RequestConfig::new().with_validate_status(|status| status != StatusCode::OK),
        )
        .await?;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    Ok(())
}

#[tokio::test]
async fn response_interceptor_recovers_errors() -> Result<(), BoxError> {
    let transport = MockTransport::new().with_reply(MockReply::status(404));
    let client = client(&transport);
    let seen = Log::default();

    let log = seen.clone();
    client.interceptors().response.use_interceptor(
        Interceptor::new(move |response: Response| {
            log.lock().push("skipped".into());
            async move { Ok(response) }
        })
        .on_rejected(|error: Error| async move {
            let mut response = error.into_response().ok_or_else(|| Error::interceptor("no response"))?;
            response.data = Data::from("fallback");
            Ok(response)
        }),
    );

    let response = client.get("/missing", RequestConfig::default()).await?;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.data.as_text(), Some("fallback"));
    assert!(seen.lock().is_empty());

    Ok(())
}

#[tokio::test]
async fn request_interceptor_failure_skips_transport() -> Result<(), BoxError> {
    let transport = MockTransport::new();
    let client = client(&transport);

    client
        .interceptors()
        .request
        .use_interceptor(Interceptor::new(|_: RequestConfig| async {
            Err(Error::interceptor("not signed in"))
        }));

    let error = client
        .get("/private", RequestConfig::default())
        .await
        .expect_err("interceptor rejects");
    assert_eq!(error.kind(), ErrorKind::Interceptor);
    assert_eq!(error.to_string(), "not signed in");
    assert!(transport.requests().is_empty());

    Ok(())
}

#[tokio::test]
async fn network_errors_reach_response_interceptors() -> Result<(), BoxError> {
    let transport = MockTransport::new().with_reply(MockReply::Fail("refused".into()));
    let client = client(&transport);

    client.interceptors().response.use_interceptor(
        Interceptor::new(|response: Response| async move { Ok(response) }).on_rejected(
            |error: Error| async move {
                assert_eq!(error.kind(), ErrorKind::Network);
                Err(Error::interceptor(format!("wrapped: {}", error.message())))
            },
        ),
    );

    let error = client
        .get("/down", RequestConfig::default())
        .await
        .expect_err("network failure");
    assert_eq!(error.message(), "wrapped: Network Error");

    Ok(())
}

#[tokio::test]
async fn defaults_apply_to_every_request() -> Result<(), BoxError> {
    let transport = MockTransport::new();
    let client = Client::builder()
        .with_transport(transport.clone())
        .with_base_url("http://api.test/v2")
        .with_header("X-Api-Key", "k")
        .build();

    client.delete("widgets/7", RequestConfig::default()).await?;
    client
        .request_url("http://elsewhere.test/abs", RequestConfig::default())
        .await?;

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Delete);
    assert_eq!(requests[0].url, "http://api.test/v2/widgets/7");
    assert_eq!(requests[0].headers.get("x-api-key"), Some("k"));
    assert_eq!(requests[1].method, Method::Get);
    assert_eq!(requests[1].url, "http://elsewhere.test/abs");

    assert_eq!(
        client.get_uri(RequestConfig::from("/search").with_param("q", "rust lang")),
        "http://api.test/v2/search?q=rust+lang"
    );

    Ok(())
}
