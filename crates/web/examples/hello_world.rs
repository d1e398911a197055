use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::json;
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use whorl_web::{
    middleware_fn, App, ConnectionInfo, Context, InboundBody, MiddlewareFuture, Next, Transport,
};

fn request_logger(ctx: &mut Context, next: Next) -> MiddlewareFuture<'_> {
    Box::pin(async move {
        let started = std::time::Instant::now();
        next.run(ctx).await?;
        info!(
            method = %ctx.method(),
            path = ctx.path(),
            status = %ctx.status(),
            elapsed = ?started.elapsed(),
            "request served"
        );
        Ok(())
    })
}

fn greet(ctx: &mut Context, next: Next) -> MiddlewareFuture<'_> {
    Box::pin(async move {
        if ctx.path() == "/greet" {
            let name = ctx.query().get("name").unwrap_or("world").to_owned();
            ctx.set_body(json!({ "greeting": format!("hello, {name}") }));
            return Ok(());
        }
        next.run(ctx).await
    })
}

/// Transport double that buffers the whole exchange in memory. A real
/// integration would write to its connection instead.
#[derive(Default)]
struct Buffered {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    closed: CancellationToken,
}

#[async_trait]
impl Transport for Buffered {
    fn headers_sent(&self) -> bool {
        self.status.is_some()
    }

    fn writable(&self) -> bool {
        true
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn send_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        self.status = Some(status);
        self.headers = headers.clone();
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    async fn end(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut app = App::new();
    app.with(middleware_fn(request_logger));
    app.with(middleware_fn(greet));
    let dispatcher = app.dispatcher();

    for target in ["/greet?name=whorl", "/missing"] {
        let request = http::Request::builder()
            .uri(target)
            .body(InboundBody::empty())
            .unwrap();
        let mut transport = Buffered::default();
        dispatcher
            .handle(request, ConnectionInfo::default(), &mut transport)
            .await;

        println!(
            "{} -> {} {:?}",
            target,
            transport.status.map_or(0, |s| s.as_u16()),
            String::from_utf8_lossy(&transport.body),
        );
    }
}
