use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use courier::config::ProgressEvent;
use courier::{Builder, CancelToken, ErrorKind, RequestConfig};
use courier::transport::HttpTransport;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

async fn echo(
    req: http::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, BoxError> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    let echoed = json!({
        "method": parts.method.as_str(),
        "uri": parts.uri.to_string(),
        "host": parts.headers.get("host").and_then(|v| v.to_str().ok()),
        "content_type": parts.headers.get("content-type").and_then(|v| v.to_str().ok()),
        "body": String::from_utf8_lossy(&body),
    });

    let status = if parts.uri.path() == "/missing" { 404 } else { 200 };
    Ok(http::response::Builder::new()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(echoed.to_string())))?)
}

async fn serve_one_h1(listener: TcpListener) -> Result<(), BoxError> {
    let (stream, _) = listener.accept().await?;
    let service = hyper::service::service_fn(echo);
    hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn listener() -> Result<(TcpListener, SocketAddr), BoxError> {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

#[tokio::test]
async fn get_over_http() -> Result<(), BoxError> {
    let (listener, addr) = listener().await?;
    let server = tokio::spawn(serve_one_h1(listener));

    let client = Builder::<HttpTransport>::default()
        .with_base_url(format!("http://{addr}/api"))
        .build();
    let response = client
        .get("/users", RequestConfig::new().with_param("page", 2))
        .await?;

    assert_eq!(response.status, http::StatusCode::OK);
    assert_eq!(response.status_text, "OK");
    let echoed = response.data.as_json().ok_or("not json")?;
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["uri"], "/api/users?page=2");
    assert_eq!(echoed["host"], addr.to_string());
    assert_eq!(echoed["content_type"], serde_json::Value::Null);

    server.await??;
    Ok(())
}

#[tokio::test]
async fn post_json_with_progress() -> Result<(), BoxError> {
    let (listener, addr) = listener().await?;
    let server = tokio::spawn(serve_one_h1(listener));

    let uploads = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let downloads = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
    let mut config = RequestConfig::new();
    config.on_upload_progress = Some(courier::config::ProgressHandler::new({
        let uploads = uploads.clone();
        move |event| uploads.lock().push(event)
    }));
    config.on_download_progress = Some(courier::config::ProgressHandler::new({
        let downloads = downloads.clone();
        move |event| downloads.lock().push(event)
    }));

    let client = Builder::<HttpTransport>::default().build();
    let response = client
        .post(
            format!("http://{addr}/things"),
            Some(json!({"name": "widget"}).into()),
            config,
        )
        .await?;

    let echoed = response.data.as_json().ok_or("not json")?;
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["content_type"], "application/json;charset=utf-8");
    assert_eq!(echoed["body"], r#"{"name":"widget"}"#);

    let uploaded = uploads.lock().last().copied().ok_or("no upload progress")?;
    assert_eq!(uploaded.loaded, 17);
    let downloaded = downloads.lock().last().copied().ok_or("no download progress")?;
    assert_eq!(Some(downloaded.loaded), downloaded.total);

    server.await??;
    Ok(())
}

#[tokio::test]
async fn not_found_is_a_validation_error() -> Result<(), BoxError> {
    let (listener, addr) = listener().await?;
    let server = tokio::spawn(serve_one_h1(listener));

    let client = Builder::<HttpTransport>::default().build();
    let error = client
        .get(format!("http://{addr}/missing"), RequestConfig::new())
        .await
        .expect_err("404");
    assert_eq!(error.kind(), ErrorKind::Validation);
    assert_eq!(error.response().map(|r| r.status.as_u16()), Some(404));

    server.await??;
    Ok(())
}

#[tokio::test]
async fn silent_server_times_out() -> Result<(), BoxError> {
    let (listener, addr) = listener().await?;
    // Accept the connection but never answer.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
        Ok::<_, BoxError>(())
    });

    let client = Builder::<HttpTransport>::default()
        .with_timeout(Duration::from_millis(50))
        .build();
    let error = client
        .get(format!("http://{addr}/slow"), RequestConfig::new())
        .await
        .expect_err("timeout");
    assert!(error.is_timeout());
    assert_eq!(error.message(), "Timeout of 50 ms exceeded");

    server.abort();
    Ok(())
}

#[tokio::test]
async fn cancel_stops_http_request() -> Result<(), BoxError> {
    let (listener, addr) = listener().await?;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
        Ok::<_, BoxError>(())
    });

    let source = CancelToken::source();
    let client = Builder::<HttpTransport>::default().build();
    let pending = tokio::spawn({
        let config = RequestConfig::new().with_cancel_token(source.token.clone());
        async move { client.get(format!("http://{addr}/slow"), config).await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    source.cancel.cancel(Some("user left".to_owned()));

    let error = pending.await?.expect_err("cancelled");
    assert!(error.is_cancel());
    assert_eq!(error.message(), "user left");

    server.abort();
    Ok(())
}

#[tokio::test]
async fn connection_refused_is_a_network_error() -> Result<(), BoxError> {
    let (listener, addr) = listener().await?;
    drop(listener);

    let client = Builder::<HttpTransport>::default().build();
    let error = client
        .get(format!("http://{addr}/"), RequestConfig::new())
        .await
        .expect_err("refused");
    assert_eq!(error.kind(), ErrorKind::Network);
    assert_eq!(error.code(), Some("ERR_NETWORK"));

    Ok(())
}
