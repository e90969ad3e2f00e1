use std::sync::Arc;
use std::time::Duration;

/// Why a request or an iteration failed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    InvalidUrl,
    UnsupportedScheme,
    InvalidHeader,
    /// The scenario itself failed outside of any request.
    Scenario,
}

#[cfg(feature = "http")]
impl From<loadr_http::HttpTransportErrorKind> for ErrorKind {
    fn from(kind: loadr_http::HttpTransportErrorKind) -> Self {
        use loadr_http::HttpTransportErrorKind as K;
        match kind {
            K::InvalidUrl => Self::InvalidUrl,
            K::UnsupportedScheme => Self::UnsupportedScheme,
            K::Request => Self::Request,
            K::InvalidHeader => Self::InvalidHeader,
            K::Connect => Self::Connect,
            K::Timeout => Self::Timeout,
            K::Body => Self::Body,
        }
    }
}

/// One request issued by a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResult {
    pub name: Option<Arc<str>>,
    /// `None` when no response was received.
    pub status: Option<u16>,
    pub latency: Duration,
    pub error: Option<ErrorKind>,
}

impl RequestResult {
    pub fn ok(status: u16, latency: Duration) -> Self {
        Self {
            name: None,
            status: Some(status),
            latency,
            error: None,
        }
    }

    pub fn failed(error: ErrorKind, latency: Duration) -> Self {
        Self {
            name: None,
            status: None,
            latency,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Transport errors and HTTP statuses of 400 and above count as failed requests.
    pub fn is_failed(&self) -> bool {
        self.error.is_some() || self.status.is_some_and(|s| s >= 400)
    }
}

/// Everything one scenario iteration produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationOutcome {
    pub requests: Vec<RequestResult>,
    pub elapsed: Duration,
    pub error: Option<ErrorKind>,
}

impl IterationOutcome {
    /// The iteration error is the first transport error among its requests, if any.
    pub fn from_requests(requests: Vec<RequestResult>, elapsed: Duration) -> Self {
        let error = requests.iter().find_map(|r| r.error);
        Self {
            requests,
            elapsed,
            error,
        }
    }

    pub fn failed(error: ErrorKind, elapsed: Duration) -> Self {
        Self {
            requests: Vec::new(),
            elapsed,
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_failure_includes_error_statuses() {
        let ms = Duration::from_millis(3);
        assert!(!RequestResult::ok(200, ms).is_failed());
        assert!(!RequestResult::ok(302, ms).is_failed());
        assert!(RequestResult::ok(404, ms).is_failed());
        assert!(RequestResult::failed(ErrorKind::Timeout, ms).is_failed());
    }

    #[test]
    fn iteration_error_is_first_transport_error() {
        let ms = Duration::from_millis(1);
        let outcome = IterationOutcome::from_requests(
            vec![
                RequestResult::ok(500, ms),
                RequestResult::failed(ErrorKind::Connect, ms),
                RequestResult::failed(ErrorKind::Timeout, ms),
            ],
            ms,
        );
        assert_eq!(outcome.error, Some(ErrorKind::Connect));
        assert!(outcome.is_failed());

        let ok = IterationOutcome::from_requests(vec![RequestResult::ok(500, ms)], ms);
        assert!(!ok.is_failed());
    }

    #[test]
    fn error_kind_names_are_snake_case() {
        assert_eq!(ErrorKind::UnsupportedScheme.to_string(), "unsupported_scheme");
        let name: &'static str = ErrorKind::InvalidUrl.into();
        assert_eq!(name, "invalid_url");
    }
}
