//! An asynchronous middleware core for HTTP applications
//!
//! This crate provides the request-handling heart of a web framework: a
//! per-request [`Context`] wrapping rich request/response facades, an
//! onion-style middleware chain, and a response finalizer that turns staged
//! state into transport writes. It contains no socket handling of its own;
//! a transport integration parses requests, implements [`Transport`] for
//! its write side and hands both to a [`Dispatcher`].
//!
//! # Features
//!
//! - Onion middleware: every layer sees the request going in and the
//!   response coming back out, with a consuming [`Next`] that makes double
//!   delegation a compile error
//! - Request facade with memoized derivations (parsed target, query
//!   multimap, negotiated accept, client IP) and proxy-aware host,
//!   protocol and forwarding-chain resolution
//! - Response facade with staged status, headers and body, committed-state
//!   protection and content-type defaulting
//! - A finalizer implementing the HEAD, bodyless-status and empty-body
//!   conventions, JSON serialization and stream piping
//! - Centralized error recovery with an observer hook, exposable messages
//!   and safe fallbacks once headers are on the wire
//! - Optional ambient request scope for deeply nested code
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use http::{HeaderMap, StatusCode};
//! use std::io;
//! use tokio_util::sync::CancellationToken;
//! use tracing::{info, Level};
//! use tracing_subscriber::FmtSubscriber;
//! use whorl_web::{
//!     middleware_fn, App, ConnectionInfo, Context, InboundBody, MiddlewareFuture, Next,
//!     Transport,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     let mut app = App::new();
//!     app.with(middleware_fn(timing));
//!     app.with(middleware_fn(hello));
//!     let dispatcher = app.dispatcher();
//!
//!     // A transport integration builds one request per exchange and
//!     // drives the dispatcher with its own Transport implementation.
//!     let request = http::Request::builder()
//!         .uri("/greet?name=world")
//!         .body(InboundBody::empty())
//!         .unwrap();
//!     let mut transport = Buffered::default();
//!     dispatcher.handle(request, ConnectionInfo::default(), &mut transport).await;
//!
//!     info!(body = %String::from_utf8_lossy(&transport.body), "responded");
//! }
//!
//! fn timing(ctx: &mut Context, next: Next) -> MiddlewareFuture<'_> {
//!     Box::pin(async move {
//!         let started = std::time::Instant::now();
//!         next.run(ctx).await?;
//!         info!(path = ctx.path(), elapsed = ?started.elapsed(), "served");
//!         Ok(())
//!     })
//! }
//!
//! fn hello(ctx: &mut Context, _next: Next) -> MiddlewareFuture<'_> {
//!     Box::pin(async move {
//!         let name = ctx.query().get("name").unwrap_or("stranger").to_owned();
//!         ctx.set_body(format!("Hello, {name}!"));
//!         Ok(())
//!     })
//! }
//!
//! /// Write side collecting everything in memory.
//! #[derive(Default)]
//! struct Buffered {
//!     status: Option<StatusCode>,
//!     body: Vec<u8>,
//!     closed: CancellationToken,
//! }
//!
//! #[async_trait]
//! impl Transport for Buffered {
//!     fn headers_sent(&self) -> bool {
//!         self.status.is_some()
//!     }
//!     fn writable(&self) -> bool {
//!         true
//!     }
//!     fn closed(&self) -> CancellationToken {
//!         self.closed.clone()
//!     }
//!     async fn send_head(&mut self, status: StatusCode, _headers: &HeaderMap) -> io::Result<()> {
//!         self.status = Some(status);
//!         Ok(())
//!     }
//!     async fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
//!         self.body.extend_from_slice(&chunk);
//!         Ok(())
//!     }
//!     async fn end(&mut self) -> io::Result<()> {
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`App`] holds configuration and the ordered middleware list;
//!   [`App::dispatcher`] freezes both into an immutable snapshot
//! - [`Dispatcher`] serves one exchange per call: context construction,
//!   the chain raced against connection loss, then finalize or recover
//! - [`Context`] owns a [`Request`] and [`Response`] facade pair plus a
//!   typed state bag shared along the chain
//! - [`scope`] exposes an opt-in ambient snapshot of the request a task
//!   is currently serving

mod accept;
mod app;
mod body;
mod context;
mod dispatch;
mod error;
mod freshness;
mod middleware;
mod query;
mod request;
mod respond;
mod response;
pub mod scope;
mod transport;

#[cfg(test)]
mod testing;

pub use accept::Accept;
pub use app::{App, AppBuilder, Config, ErrorHook};
pub use body::{Body, InboundBody};
pub use context::Context;
pub use dispatch::Dispatcher;
pub use error::{HttpError, Result};
pub use middleware::{middleware_fn, Chain, FnMiddleware, Middleware, MiddlewareFuture, Next};
pub use query::Query;
pub use request::Request;
pub use response::Response;
pub use transport::{ConnectionInfo, Transport};
