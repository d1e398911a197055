use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;

/// Boxed future returned by function middleware; borrows the context for
/// as long as it runs.
pub type MiddlewareFuture<'a> = BoxFuture<'a, Result<()>>;

/// One layer of the onion.
///
/// A middleware sees the context on the way in, decides whether to call
/// [`Next::run`], and sees it again on the way out once everything
/// downstream has returned. Not calling `next` short-circuits the chain;
/// returning an error unwinds through every pending caller.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut Context, next: Next) -> Result<()>;
}

/// Continuation into the rest of the chain.
///
/// `Next` is consumed by [`run`](Next::run), so a layer can invoke its
/// downstream at most once; a second call does not compile:
///
/// ```compile_fail
/// use whorl_web::{Context, MiddlewareFuture, Next};
///
/// fn twice(ctx: &mut Context, next: Next) -> MiddlewareFuture<'_> {
///     Box::pin(async move {
///         next.run(ctx).await?;
///         next.run(ctx).await
///     })
/// }
/// ```
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
}

impl Next {
    /// Runs the remainder of the chain. Past the last layer this resolves
    /// immediately with `Ok(())`.
    pub async fn run(self, ctx: &mut Context) -> Result<()> {
        let Next { chain, index } = self;
        match chain.get(index).cloned() {
            Some(layer) => layer.handle(ctx, Next { chain, index: index + 1 }).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish_non_exhaustive()
    }
}

/// Immutable snapshot of a middleware list, ready to dispatch.
///
/// Cloning shares the underlying stack; layers registered on the
/// application after the snapshot do not appear in it.
#[derive(Clone)]
pub struct Chain {
    stack: Arc<[Arc<dyn Middleware>]>,
}

impl Chain {
    pub fn new(stack: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stack: Arc::from(stack) }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs the whole chain over one context. An empty chain resolves with
    /// `Ok(())` and leaves the context untouched.
    pub async fn dispatch(&self, ctx: &mut Context) -> Result<()> {
        Next { chain: Arc::clone(&self.stack), index: 0 }.run(ctx).await
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}

/// Adapts a plain function into a [`Middleware`].
///
/// Works with `fn` items returning a boxed future:
///
/// ```
/// use whorl_web::{middleware_fn, Context, MiddlewareFuture, Next};
///
/// fn log_path(ctx: &mut Context, next: Next) -> MiddlewareFuture<'_> {
///     Box::pin(async move {
///         let path = ctx.path().to_owned();
///         next.run(ctx).await?;
///         tracing::info!(%path, status = %ctx.status(), "served");
///         Ok(())
///     })
/// }
///
/// let layer = middleware_fn(log_path);
/// # let _ = layer;
/// ```
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next) -> MiddlewareFuture<'a> + Send + Sync,
{
    FnMiddleware { f }
}

/// A [`Middleware`] backed by a function. Built with [`middleware_fn`].
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnMiddleware")
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next) -> MiddlewareFuture<'a> + Send + Sync,
{
    async fn handle(&self, ctx: &mut Context, next: Next) -> Result<()> {
        (self.f)(ctx, next).await
    }
}
