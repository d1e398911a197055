use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::BodyExt;
use serde::Serialize;
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{HttpError, Result};

/// Payload staged on the response facade. Nothing is written until the
/// finalizer runs; middleware may replace the staged body any number of
/// times before then.
pub enum Body {
    /// No payload staged.
    Empty,
    /// UTF-8 text, sent as-is.
    Text(String),
    /// Raw bytes, sent as-is.
    Bytes(Bytes),
    /// Structured value, serialized to JSON by the finalizer.
    Json(Value),
    /// Frame stream piped chunk by chunk.
    Stream(UnsyncBoxBody<Bytes, HttpError>),
}

impl Body {
    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::Text(text.into())
    }

    pub fn bytes<B: Into<Bytes>>(bytes: B) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes, Error = HttpError> + Send + 'static,
    {
        Self::Stream(UnsyncBoxBody::new(body))
    }

    /// Serializes any value implementing [`Serialize`] into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Byte length when it is knowable without driving the payload.
    /// Streams have no length; JSON is measured by serializing.
    pub fn len(&self) -> Option<u64> {
        match self {
            Self::Empty => None,
            Self::Text(text) => Some(text.len() as u64),
            Self::Bytes(bytes) => Some(bytes.len() as u64),
            Self::Json(value) => serde_json::to_vec(value).ok().map(|buf| buf.len() as u64),
            Self::Stream(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::Empty
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Body::Empty"),
            Self::Text(text) => f.debug_tuple("Body::Text").field(&text.len()).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Body::Bytes").field(&bytes.len()).finish(),
            Self::Json(_) => f.write_str("Body::Json"),
            Self::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value.to_owned())
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<()> for Body {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

/// Request payload handed over by the transport. Reading it consumes it;
/// the request facade hands it out through `take_body` exactly once.
pub struct InboundBody {
    inner: UnsyncBoxBody<Bytes, HttpError>,
}

impl InboundBody {
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<HttpError>,
    {
        Self { inner: UnsyncBoxBody::new(body.map_err(Into::into)) }
    }

    pub fn empty() -> Self {
        let body = http_body_util::Empty::<Bytes>::new().map_err(|never| match never {});
        Self { inner: UnsyncBoxBody::new(body) }
    }

    pub fn from_bytes<B: Into<Bytes>>(bytes: B) -> Self {
        let body = http_body_util::Full::new(bytes.into()).map_err(|never| match never {});
        Self { inner: UnsyncBoxBody::new(body) }
    }

    /// Drains the whole payload into one buffer.
    pub async fn collect_bytes(self) -> Result<Bytes> {
        Ok(self.inner.collect().await?.to_bytes())
    }

    /// Drains the payload and deserializes it as JSON. Malformed input is a
    /// client mistake, so the failure is a 400.
    pub async fn collect_json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        let bytes = self.inner.collect().await?.to_bytes();
        serde_json::from_slice(&bytes)
            .map_err(|e| HttpError::new(http::StatusCode::BAD_REQUEST, e.to_string()))
    }
}

impl HttpBody for InboundBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl std::fmt::Debug for InboundBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InboundBody")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_str_becomes_empty_body() {
        assert!(Body::from("").is_empty());
        assert!(!Body::from("hi").is_empty());
    }

    #[test]
    fn text_and_bytes_report_length() {
        assert_eq!(Body::text("hello").len(), Some(5));
        assert_eq!(Body::bytes(vec![1u8, 2, 3]).len(), Some(3));
        assert_eq!(Body::empty().len(), None);
    }

    #[test]
    fn json_length_matches_serialized_form() {
        let body = Body::json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(body.len(), Some(r#"{"a":1}"#.len() as u64));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn inbound_body_collects_to_bytes() {
        let body = InboundBody::from_bytes("payload");
        let bytes = body.collect_bytes().await.unwrap();
        assert_eq!(&bytes[..], b"payload");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn inbound_body_collects_json() {
        #[derive(serde::Deserialize)]
        struct Payload {
            a: u32,
        }
        let body = InboundBody::from_bytes(r#"{"a": 7}"#);
        let payload: Payload = body.collect_json().await.unwrap();
        assert_eq!(payload.a, 7);
    }
}
