use std::time::Duration;

use hyper_util::client::legacy::Error as ClientError;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure class of a request, used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum HttpTransportErrorKind {
    InvalidUrl,
    UnsupportedScheme,
    InvalidHeader,
    Connect,
    Request,
    Timeout,
    Body,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url `{0}`")]
    InvalidUrl(String),

    #[error("unsupported scheme in `{0}` (only http:// and https:// are supported)")]
    UnsupportedScheme(String),

    #[error("invalid header `{0}`")]
    InvalidHeader(String),

    #[error("could not connect: {0}")]
    Connect(#[source] ClientError),

    #[error("request failed: {0}")]
    Request(#[source] ClientError),

    #[error("no complete response within {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        if err.is_connect() {
            Self::Connect(err)
        } else {
            Self::Request(err)
        }
    }
}

impl Error {
    #[must_use]
    pub fn transport_error_kind(&self) -> HttpTransportErrorKind {
        match self {
            Self::InvalidUrl(_) => HttpTransportErrorKind::InvalidUrl,
            Self::UnsupportedScheme(_) => HttpTransportErrorKind::UnsupportedScheme,
            Self::InvalidHeader(_) => HttpTransportErrorKind::InvalidHeader,
            Self::Connect(_) => HttpTransportErrorKind::Connect,
            Self::Request(_) => HttpTransportErrorKind::Request,
            Self::Timeout(_) => HttpTransportErrorKind::Timeout,
            Self::Body(_) => HttpTransportErrorKind::Body,
        }
    }
}
