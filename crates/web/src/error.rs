use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T, E = HttpError> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Error raised by middleware or by the core itself, carrying the HTTP
/// metadata recovery needs: a status code, an expose flag deciding whether
/// the message may be shown to the client, and optional headers to apply to
/// the error response.
///
/// Statuses outside the 4xx/5xx classes are coerced to 500 so recovery can
/// never render a success status.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    expose: bool,
    headers: Option<HeaderMap>,
    headers_sent: bool,
    aborted: bool,
    #[source]
    source: Option<BoxError>,
}

impl HttpError {
    /// Creates an error with the given status and message.
    ///
    /// Client errors (4xx) expose their message by default, server errors
    /// (5xx) do not, mirroring the conventional split between caller
    /// mistakes and internal defects.
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        let status = coerce_status(status);
        Self {
            status,
            message: message.into(),
            expose: status.is_client_error(),
            headers: None,
            headers_sent: false,
            aborted: false,
            source: None,
        }
    }

    /// Wraps an arbitrary failure as an opaque 500.
    pub fn internal<E: Into<BoxError>>(err: E) -> Self {
        let source = err.into();
        let mut this = Self::new(StatusCode::INTERNAL_SERVER_ERROR, source.to_string());
        this.source = Some(source);
        this
    }

    /// Marker raised when the connection terminates before the chain
    /// finished. Recovery writes nothing for these; they only reach the
    /// error observer.
    pub fn connection_aborted() -> Self {
        let mut this =
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, "connection closed before the response completed");
        this.aborted = true;
        this
    }

    /// Overrides the expose flag.
    pub fn with_expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    /// Adds a header to apply to the error response during recovery.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.get_or_insert_with(HeaderMap::new).insert(name, value);
        self
    }

    /// Replaces the full header set carried by this error.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Attaches the underlying cause.
    pub fn with_source<E: Into<BoxError>>(mut self, source: E) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_exposed(&self) -> bool {
        self.expose
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    /// True once recovery determined the response head had already been
    /// written, meaning no rewrite was attempted.
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub(crate) fn set_headers_sent(&mut self) {
        self.headers_sent = true;
    }
}

/// Confines a status to the error classes; anything else becomes 500.
fn coerce_status(status: StatusCode) -> StatusCode {
    if status.is_client_error() || status.is_server_error() {
        status
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Outward text for a status: the canonical reason phrase, or the bare code
/// when the table has no entry.
pub(crate) fn reason_phrase(status: StatusCode) -> String {
    status.canonical_reason().map(str::to_owned).unwrap_or_else(|| status.as_u16().to_string())
}

impl From<io::Error> for HttpError {
    fn from(value: io::Error) -> Self {
        let status = if value.kind() == io::ErrorKind::NotFound {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let mut this = Self::new(status, value.to_string());
        this.expose = false;
        this.source = Some(Box::new(value));
        this
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(value: serde_json::Error) -> Self {
        Self::internal(value)
    }
}

impl From<http::Error> for HttpError {
    fn from(value: http::Error) -> Self {
        Self::internal(value)
    }
}

impl From<http::header::InvalidHeaderValue> for HttpError {
    fn from(value: http::header::InvalidHeaderValue) -> Self {
        Self::internal(value)
    }
}

impl From<BoxError> for HttpError {
    fn from(value: BoxError) -> Self {
        Self::internal(value)
    }
}

impl From<String> for HttpError {
    fn from(value: String) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, value)
    }
}

impl From<&str> for HttpError {
    fn from(value: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, value.to_owned())
    }
}
