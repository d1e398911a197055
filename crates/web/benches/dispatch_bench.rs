use async_trait::async_trait;
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use http::{HeaderMap, StatusCode};
use std::hint::black_box;
use std::io;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use whorl_web::{
    middleware_fn, App, ConnectionInfo, Context, Dispatcher, InboundBody, MiddlewareFuture, Next,
    Transport,
};

/// Write side that drops everything, so the chain dominates the measurement.
struct Sink {
    sent: bool,
    closed: CancellationToken,
}

impl Sink {
    fn new() -> Self {
        Self { sent: false, closed: CancellationToken::new() }
    }
}

#[async_trait]
impl Transport for Sink {
    fn headers_sent(&self) -> bool {
        self.sent
    }

    fn writable(&self) -> bool {
        true
    }

    fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn send_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        self.sent = true;
        black_box((status, headers.len()));
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: Bytes) -> io::Result<()> {
        black_box(chunk.len());
        Ok(())
    }

    async fn end(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn pass_through(ctx: &mut Context, next: Next) -> MiddlewareFuture<'_> {
    Box::pin(async move { next.run(ctx).await })
}

fn hello(ctx: &mut Context, _next: Next) -> MiddlewareFuture<'_> {
    Box::pin(async move {
        ctx.set_body("hello world");
        Ok(())
    })
}

fn hello_dispatcher(layers: usize) -> Dispatcher {
    let mut app = App::new();
    for _ in 0..layers {
        app.with(middleware_fn(pass_through));
    }
    app.with(middleware_fn(hello));
    app.dispatcher()
}

fn request(target: &str) -> http::Request<InboundBody> {
    http::Request::builder()
        .uri(target)
        .body(InboundBody::empty())
        .expect("valid request")
}

fn benchmark_dispatch(criterion: &mut Criterion) {
    let runtime = Runtime::new().expect("tokio runtime");
    let mut group = criterion.benchmark_group("dispatcher");

    let shallow = hello_dispatcher(0);
    group.bench_function("hello_direct", |b| {
        b.iter_batched(
            || (request("/hello"), Sink::new()),
            |(req, mut transport)| {
                runtime.block_on(shallow.handle(req, ConnectionInfo::default(), &mut transport));
                black_box(transport.sent);
            },
            BatchSize::SmallInput,
        );
    });

    let deep = hello_dispatcher(8);
    group.bench_function("hello_eight_layers", |b| {
        b.iter_batched(
            || (request("/hello"), Sink::new()),
            |(req, mut transport)| {
                runtime.block_on(deep.handle(req, ConnectionInfo::default(), &mut transport));
                black_box(transport.sent);
            },
            BatchSize::SmallInput,
        );
    });

    let empty = App::new().dispatcher();
    group.bench_function("untouched_404", |b| {
        b.iter_batched(
            || (request("/missing"), Sink::new()),
            |(req, mut transport)| {
                runtime.block_on(empty.handle(req, ConnectionInfo::default(), &mut transport));
                black_box(transport.sent);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(dispatch, benchmark_dispatch);
criterion_main!(dispatch);
