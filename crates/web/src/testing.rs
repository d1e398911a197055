//! In-crate helpers for exercising the facades and the dispatcher without
//! a real connection.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Version};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::app::Config;
use crate::body::InboundBody;
use crate::context::Context;
use crate::request::Request;
use crate::response::Response;
use crate::transport::{ConnectionInfo, Transport};

/// Declarative request description for tests. Builds either a bare facade
/// ([`request_with`]), a full context ([`context_with`]) or dispatcher
/// inputs ([`request_parts`]).
pub(crate) struct TestRequest {
    method: Method,
    target: String,
    version: Version,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    remote_addr: Option<SocketAddr>,
    encrypted: bool,
    config: Config,
}

impl TestRequest {
    pub fn get(target: &str) -> Self {
        Self {
            method: Method::GET,
            target: target.to_owned(),
            version: Version::HTTP_11,
            headers: Vec::new(),
            body: None,
            remote_addr: None,
            encrypted: false,
            config: Config::default(),
        }
    }

    pub fn head(target: &str) -> Self {
        let mut this = Self::get(target);
        this.method = Method::HEAD;
        this
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body_bytes<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn remote_addr(mut self, addr: &str) -> Self {
        self.remote_addr = Some(addr.parse().unwrap());
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn proxy(mut self) -> Self {
        self.config.proxy = true;
        self
    }

    pub fn subdomain_offset(mut self, offset: usize) -> Self {
        self.config.subdomain_offset = offset;
        self
    }

    pub fn max_ips_count(mut self, count: usize) -> Self {
        self.config.max_ips_count = count;
        self
    }

    fn into_http(self) -> (http::Request<InboundBody>, ConnectionInfo, Config) {
        let mut builder =
            http::Request::builder().method(self.method).uri(self.target).version(self.version);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let inbound = match self.body {
            Some(bytes) => InboundBody::from_bytes(bytes),
            None => InboundBody::empty(),
        };
        let request = builder.body(inbound).unwrap();
        let conn = ConnectionInfo::new(self.remote_addr, self.encrypted);
        (request, conn, self.config)
    }
}

/// Builds the request facade directly, honoring the per-test config.
pub(crate) fn request_with(req: TestRequest) -> Request {
    let (request, conn, config) = req.into_http();
    let (parts, body) = request.into_parts();
    Request::new(parts, body, conn, Arc::new(config))
}

/// Builds a full context around [`request_with`].
pub(crate) fn context_with(req: TestRequest) -> Context {
    Context::new(request_with(req), Response::new())
}

/// Dispatcher inputs. The per-test config is dropped here; a dispatcher
/// carries its application's config instead.
pub(crate) fn request_parts(req: TestRequest) -> (http::Request<InboundBody>, ConnectionInfo) {
    let (request, conn, _config) = req.into_http();
    (request, conn)
}

/// Transport double recording everything the core writes.
#[derive(Debug)]
pub(crate) struct TestTransport {
    pub head: Option<(StatusCode, HeaderMap)>,
    pub chunks: Vec<Bytes>,
    pub ended: bool,
    pub writable: bool,
    pub headers_sent: bool,
    pub closed: CancellationToken,
    fail_after_chunks: Option<usize>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self {
            head: None,
            chunks: Vec::new(),
            ended: false,
            writable: true,
            headers_sent: false,
            closed: CancellationToken::new(),
            fail_after_chunks: None,
        }
    }

    /// A peer that can no longer receive bytes.
    pub fn unwritable() -> Self {
        let mut this = Self::new();
        this.writable = false;
        this
    }

    /// An exchange whose head already went out before the core got
    /// involved again.
    pub fn already_committed() -> Self {
        let mut this = Self::new();
        this.headers_sent = true;
        this
    }

    /// Accepts `limit` chunks, then fails writes.
    pub fn failing_after_chunks(limit: usize) -> Self {
        let mut this = Self::new();
        this.fail_after_chunks = Some(limit);
        this
    }

    pub fn sent_status(&self) -> StatusCode {
        self.head.as_ref().expect("no head was sent").0
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.as_ref().and_then(|(_, headers)| headers.get(name)).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        let mut buf = Vec::new();
        for chunk in &self.chunks {
            buf.extend_from_slice(chunk);
        }
        String::from_utf8(buf).expect("body was not utf-8")
    }
}

#[async_trait]
impl Transport for TestTransport {
    fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn writable(&self) -> bool {
        self.writable
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn send_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        if !self.writable {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer is gone"));
        }
        self.headers_sent = true;
        self.head = Some((status, headers.clone()));
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        if !self.writable {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer is gone"));
        }
        if let Some(limit) = self.fail_after_chunks {
            if self.chunks.len() >= limit {
                self.writable = false;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
            }
        }
        self.chunks.push(chunk);
        Ok(())
    }

    async fn end(&mut self) -> io::Result<()> {
        self.ended = true;
        Ok(())
    }
}
