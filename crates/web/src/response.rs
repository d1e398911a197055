use http::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED,
    LOCATION, TRANSFER_ENCODING,
};
use http::StatusCode;
use mime::Mime;
use std::time::SystemTime;
use tracing::trace;

use crate::body::Body;
use crate::error::Result;

/// Write side of one exchange. Everything here is staged state; the
/// finalizer turns it into transport writes after the chain completes.
///
/// Once the head is committed to the wire every mutation becomes a no-op,
/// so late middleware cannot corrupt an in-flight response.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    explicit_status: bool,
    headers: HeaderMap,
    body: Body,
    explicit_empty: bool,
    committed: bool,
}

impl Response {
    pub(crate) fn new() -> Self {
        Self {
            status: StatusCode::OK,
            explicit_status: false,
            headers: HeaderMap::new(),
            body: Body::Empty,
            explicit_empty: false,
            committed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status explicitly. Switching to a bodyless status discards
    /// any staged payload.
    pub fn set_status(&mut self, status: StatusCode) {
        if self.guard() {
            return;
        }
        self.explicit_status = true;
        self.status = status;
        if bodyless_status(status) && !self.body.is_empty() {
            self.set_body(Body::Empty);
        }
    }

    /// Seeds the status without marking it explicit, so a later `set_body`
    /// still upgrades it to 200.
    pub(crate) fn stage_default_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Stages the payload.
    ///
    /// An empty body marks the response as deliberately empty: the status
    /// becomes 204 unless it is already bodyless, and staged entity headers
    /// are dropped. A non-empty body upgrades a defaulted status to 200 and
    /// fills in a content type when none is staged.
    pub fn set_body<B: Into<Body>>(&mut self, body: B) {
        if self.guard() {
            return;
        }
        let body = body.into();

        if body.is_empty() {
            self.explicit_empty = true;
            if !bodyless_status(self.status) {
                self.status = StatusCode::NO_CONTENT;
                self.explicit_status = true;
            }
            self.headers.remove(CONTENT_TYPE);
            self.headers.remove(CONTENT_LENGTH);
            self.headers.remove(TRANSFER_ENCODING);
            self.body = Body::Empty;
            return;
        }

        self.explicit_empty = false;
        if !self.explicit_status {
            self.status = StatusCode::OK;
        }
        if !self.headers.contains_key(CONTENT_TYPE) {
            let default_type = match &body {
                Body::Text(_) => mime_value(&mime::TEXT_PLAIN_UTF_8),
                Body::Json(_) => mime_value(&mime::APPLICATION_JSON),
                Body::Bytes(_) | Body::Stream(_) | Body::Empty => {
                    mime_value(&mime::APPLICATION_OCTET_STREAM)
                }
            };
            self.headers.insert(CONTENT_TYPE, default_type);
        }
        if body.is_stream() {
            self.headers.remove(CONTENT_LENGTH);
        }
        self.body = body;
    }

    pub(crate) fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub(crate) fn is_explicit_empty(&self) -> bool {
        self.explicit_empty
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn set(&mut self, name: HeaderName, value: HeaderValue) {
        if self.guard() {
            return;
        }
        self.headers.insert(name, value);
    }

    pub fn append(&mut self, name: HeaderName, value: HeaderValue) {
        if self.guard() {
            return;
        }
        self.headers.append(name, value);
    }

    pub fn remove(&mut self, name: HeaderName) {
        if self.guard() {
            return;
        }
        self.headers.remove(name);
    }

    /// Response length: an explicit `Content-Length` wins, otherwise the
    /// staged body is measured.
    pub fn length(&self) -> Option<u64> {
        self.get("content-length").and_then(|v| v.parse().ok()).or_else(|| self.body.len())
    }

    pub(crate) fn stage_content_length(&mut self, length: u64) {
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }

    pub fn content_type(&self) -> Option<Mime> {
        self.get("content-type").and_then(|v| v.parse().ok())
    }

    pub fn etag(&self) -> Option<&str> {
        self.get("etag")
    }

    /// Stages an `ETag`, quoting the tag when the caller did not.
    pub fn set_etag(&mut self, tag: &str) -> Result<()> {
        let quoted = if tag.starts_with('"') || tag.starts_with("W/\"") {
            tag.to_owned()
        } else {
            format!("\"{tag}\"")
        };
        self.set(ETAG, HeaderValue::from_str(&quoted)?);
        Ok(())
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.get("last-modified").and_then(|v| httpdate::parse_http_date(v).ok())
    }

    pub fn set_last_modified(&mut self, time: SystemTime) {
        if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(time)) {
            self.set(LAST_MODIFIED, value);
        }
    }

    /// Stages a redirect: `Location`, a 302 unless a redirect status is
    /// already set, and a small text body naming the destination.
    pub fn redirect(&mut self, location: &str) -> Result<()> {
        let value = HeaderValue::from_str(location)?;
        self.set(LOCATION, value);
        if !redirect_status(self.status) {
            self.set_status(StatusCode::FOUND);
        }
        self.set_body(Body::text(format!("Redirecting to {location}.")));
        self.set(CONTENT_TYPE, mime_value(&mime::TEXT_PLAIN_UTF_8));
        Ok(())
    }

    /// True once the head went to the wire.
    pub fn committed(&self) -> bool {
        self.committed
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed = true;
    }

    pub(crate) fn clear_headers(&mut self) {
        self.headers.clear();
    }

    fn guard(&self) -> bool {
        if self.committed {
            trace!("response already committed, mutation ignored");
        }
        self.committed
    }
}

/// Statuses that must not carry a payload.
pub(crate) fn bodyless_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 204 | 205 | 304)
}

fn redirect_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 300 | 301 | 302 | 303 | 305 | 307 | 308)
}

pub(crate) fn mime_value(mime: &Mime) -> HeaderValue {
    HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}
