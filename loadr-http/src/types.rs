use std::time::Duration;

use bytes::Bytes;

use super::util::parse_header;
use super::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn body_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: http::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(http::Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: Bytes) -> Self {
        Self {
            body,
            ..Self::new(http::Method::POST, url)
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Parses the target URL, accepting only `http://` and `https://`.
    pub fn parse_url(&self) -> Result<url::Url> {
        let parsed = url::Url::parse(&self.url).map_err(|_| Error::InvalidUrl(self.url.clone()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            _ => Err(Error::UnsupportedScheme(self.url.clone())),
        }
    }

    /// Checks everything that can be rejected without touching the network.
    pub fn validate(&self) -> Result<()> {
        self.parse_url()?;
        for (name, value) in &self.headers {
            parse_header(name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpTransportErrorKind;

    #[test]
    fn validate_accepts_http_and_https() {
        assert!(HttpRequest::get("http://localhost:3000/").validate().is_ok());
        assert!(HttpRequest::get("https://example.com").validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_targets() {
        let kind = |req: HttpRequest| req.validate().err().map(|e| e.transport_error_kind());

        assert_eq!(
            kind(HttpRequest::get("not a url")),
            Some(HttpTransportErrorKind::InvalidUrl)
        );
        assert_eq!(
            kind(HttpRequest::get("ftp://example.com/file")),
            Some(HttpTransportErrorKind::UnsupportedScheme)
        );
        assert_eq!(
            kind(HttpRequest::get("http://localhost/").with_header("bad header", "x")),
            Some(HttpTransportErrorKind::InvalidHeader)
        );
    }
}
