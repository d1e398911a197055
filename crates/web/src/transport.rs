use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::io;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;

/// Connection-level facts supplied by the transport when it hands a request
/// to the dispatcher. The request facade derives `ip`, `protocol` and the
/// proxy-aware variants from these.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionInfo {
    /// Peer address, when the transport knows one.
    pub remote_addr: Option<SocketAddr>,
    /// Whether the connection itself is encrypted (TLS).
    pub encrypted: bool,
}

impl ConnectionInfo {
    pub fn new(remote_addr: Option<SocketAddr>, encrypted: bool) -> Self {
        Self { remote_addr, encrypted }
    }
}

/// Write side of one in-flight exchange.
///
/// The dispatcher drives this in a fixed order: `send_head` exactly once,
/// `send_chunk` zero or more times, then `end`. Implementations map the
/// calls onto their wire protocol; the core never touches sockets itself.
#[async_trait]
pub trait Transport: Send {
    /// True once the response head is on the wire. After this the core stops
    /// rewriting the response and recovery degrades to observer-only.
    fn headers_sent(&self) -> bool;

    /// False when the peer can no longer receive bytes. The finalizer skips
    /// all writing in that case.
    fn writable(&self) -> bool;

    /// Token cancelled when the peer disappears before the response is
    /// complete. The dispatcher races the middleware chain against it.
    fn closed(&self) -> CancellationToken;

    /// Writes the status line and headers.
    async fn send_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()>;

    /// Writes one chunk of body data.
    async fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()>;

    /// Completes the exchange.
    async fn end(&mut self) -> io::Result<()>;
}
