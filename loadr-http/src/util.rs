use bytes::Bytes;
use http::header::{CONTENT_LENGTH, HOST, HeaderName, HeaderValue};
use http_body_util::Full;

use super::{Error, HttpRequest, Result};

/// Turns a validated request into a hyper request, filling in `Host` and
/// `Content-Length` unless the caller set them.
pub(super) fn build_request(req: HttpRequest, target: &url::Url) -> Result<http::Request<Full<Bytes>>> {
    let uri: hyper::Uri = target
        .as_str()
        .parse()
        .map_err(|_| Error::InvalidUrl(req.url.clone()))?;

    let mut out = http::Request::new(Full::new(req.body.clone()));
    *out.method_mut() = req.method;
    *out.uri_mut() = uri;

    let headers = out.headers_mut();
    for (name, value) in &req.headers {
        let (name, value) = parse_header(name, value)?;
        headers.append(name, value);
    }
    if !headers.contains_key(HOST)
        && let Some(host) = host_header_value(target)
    {
        let value = HeaderValue::from_str(&host).map_err(|_| Error::InvalidHeader(host))?;
        headers.insert(HOST, value);
    }
    if !req.body.is_empty() && !headers.contains_key(CONTENT_LENGTH) {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(req.body.len()));
    }

    Ok(out)
}

pub(super) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let parsed_name =
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| Error::InvalidHeader(name.to_string()))?;
    let parsed_value =
        HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader(name.to_string()))?;
    Ok((parsed_name, parsed_value))
}

fn host_header_value(target: &url::Url) -> Option<String> {
    let host = target.host_str()?;
    Some(match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn target(raw: &str) -> url::Url {
        url::Url::parse(raw).unwrap()
    }

    #[test]
    fn host_header_keeps_an_explicit_port() {
        assert_eq!(
            host_header_value(&target("http://127.0.0.1:3000/")).as_deref(),
            Some("127.0.0.1:3000")
        );
        assert_eq!(
            host_header_value(&target("https://example.com/path")).as_deref(),
            Some("example.com")
        );
    }

    #[test]
    fn caller_headers_win_over_defaults() {
        let req = HttpRequest::post("http://localhost:3000/echo", Bytes::from_static(b"ping"))
            .with_header("Host", "override.test");
        let built = build_request(req, &target("http://localhost:3000/echo")).unwrap();

        assert_eq!(built.headers()[HOST], "override.test");
        assert_eq!(built.headers()[CONTENT_LENGTH], "4");
        assert_eq!(built.method(), http::Method::POST);
    }

    #[test]
    fn bad_header_is_rejected() {
        let req = HttpRequest::get("http://localhost/").with_header("bad header", "x");
        let err = build_request(req, &target("http://localhost/")).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(name) if name == "bad header"));
    }
}
