use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use super::util::build_request;
use super::{Error, HttpRequest, HttpResponse, Result};

/// Connect timeout used by [`HttpClient::default`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for requests that don't set [`HttpRequest::timeout`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Pooled HTTP/1.1 client shared by every virtual user of a run.
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    request_timeout: Duration,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(Some(DEFAULT_CONNECT_TIMEOUT))
    }
}

impl HttpClient {
    /// `connect_timeout` bounds TCP connection setup only. Whole-request deadlines
    /// come from [`HttpRequest::timeout`], falling back to [`DEFAULT_REQUEST_TIMEOUT`].
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut tcp = HttpConnector::new();
        tcp.enforce_http(false);
        tcp.set_nodelay(true);
        tcp.set_connect_timeout(connect_timeout);

        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(tcp);

        Self {
            inner: Client::builder(TokioExecutor::new()).build(connector),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Deadline applied to requests without their own timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Sends the request and reads the whole response body.
    ///
    /// A timeout covers connect, headers and body. Any status code is a response;
    /// only transport failures are errors.
    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let timeout = req.timeout.unwrap_or(self.request_timeout);
        match tokio::time::timeout(timeout, self.send(req)).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.request(HttpRequest::get(url)).await
    }

    async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let target = req.parse_url()?;
        let request = build_request(req, &target)?;

        let response = self.inner.request(request).await?;
        let status = response.status().as_u16();
        let body = response.into_body().collect().await?.to_bytes();

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::HttpTransportErrorKind;
    use std::time::Instant;

    #[tokio::test]
    async fn unreachable_host_fails_within_the_connect_timeout() {
        // TEST-NET-1, never routed.
        let client = HttpClient::new(Some(Duration::from_millis(200)));

        let started = Instant::now();
        let err = client.get("http://192.0.2.1:81/").await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(2), "elapsed={elapsed:?}");
        assert!(matches!(
            err.transport_error_kind(),
            HttpTransportErrorKind::Connect | HttpTransportErrorKind::Request
        ));
    }

    #[tokio::test]
    async fn bad_targets_fail_before_connecting() {
        let client = HttpClient::default();

        let err = client.get("ftp://example.com/").await.unwrap_err();
        assert_eq!(
            err.transport_error_kind(),
            HttpTransportErrorKind::UnsupportedScheme
        );

        let err = client.get("not a url").await.unwrap_err();
        assert_eq!(err.transport_error_kind(), HttpTransportErrorKind::InvalidUrl);
    }
}
