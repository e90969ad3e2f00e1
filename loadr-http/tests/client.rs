use std::time::Duration;

use loadr_http::{HttpClient, HttpRequest, HttpTransportErrorKind};
use loadr_testserver::TestServer;

#[tokio::test]
async fn get_returns_status_and_body() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = HttpClient::default();

    let res = client.get(&server.urls().hello).await?;
    assert_eq!(res.status, 200);
    assert_eq!(res.body_utf8(), Some("Hello World!"));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn non_2xx_is_a_response_not_an_error() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = HttpClient::default();

    let res = client.get(&server.urls().status(503)).await?;
    assert_eq!(res.status, 503);
    assert_eq!(server.stats().non_2xx_total(), 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn timeout_covers_the_whole_exchange() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = HttpClient::default();

    let req = HttpRequest::get(server.urls().delay(Duration::from_millis(500)))
        .with_timeout(Duration::from_millis(50));
    let err = match client.request(req).await {
        Ok(res) => anyhow::bail!("expected timeout, got status {}", res.status),
        Err(err) => err,
    };
    assert_eq!(err.transport_error_kind(), HttpTransportErrorKind::Timeout);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn requests_without_a_timeout_use_the_client_deadline() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = HttpClient::default().with_request_timeout(Duration::from_millis(50));

    let req = HttpRequest::get(server.urls().delay(Duration::from_secs(1)));
    assert_eq!(req.timeout, None);
    let err = match client.request(req).await {
        Ok(res) => anyhow::bail!("expected timeout, got status {}", res.status),
        Err(err) => err,
    };
    assert_eq!(err.transport_error_kind(), HttpTransportErrorKind::Timeout);

    assert_eq!(
        HttpClient::default().request_timeout(),
        loadr_http::DEFAULT_REQUEST_TIMEOUT
    );

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn post_sends_body() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = HttpClient::default();

    let req = HttpRequest::post(server.urls().echo.clone(), bytes::Bytes::from_static(b"ping"))
        .with_header("content-type", "text/plain");
    let res = client.request(req).await?;
    assert_eq!(res.status, 200);
    assert_eq!(res.body_utf8(), Some("ping"));

    server.shutdown().await;
    Ok(())
}
