use http::header::HeaderName;
use http::StatusCode;
use std::sync::Arc;
use tracing::error;

use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::HttpError;
use crate::middleware::{Chain, Middleware};

/// Observer invoked for every recovered error, before anything is written.
pub type ErrorHook = Arc<dyn Fn(&HttpError, &Context) + Send + Sync>;

/// Settings shared by every exchange an application serves. Built through
/// [`AppBuilder`]; immutable once a [`Dispatcher`] snapshot exists.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) proxy: bool,
    pub(crate) subdomain_offset: usize,
    pub(crate) proxy_ip_header: HeaderName,
    pub(crate) max_ips_count: usize,
    pub(crate) env: String,
    pub(crate) silent: bool,
    pub(crate) expose_scope: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy: false,
            subdomain_offset: 2,
            proxy_ip_header: HeaderName::from_static("x-forwarded-for"),
            max_ips_count: 0,
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_owned()),
            silent: false,
            expose_scope: false,
        }
    }
}

impl Config {
    /// Whether forwarding headers from an upstream proxy are trusted.
    pub fn proxy(&self) -> bool {
        self.proxy
    }

    /// How many trailing host labels do not count as subdomains.
    pub fn subdomain_offset(&self) -> usize {
        self.subdomain_offset
    }

    /// Header carrying the forwarding chain when proxy mode is on.
    pub fn proxy_ip_header(&self) -> &HeaderName {
        &self.proxy_ip_header
    }

    /// Upper bound on trusted forwarding entries; 0 means unbounded.
    pub fn max_ips_count(&self) -> usize {
        self.max_ips_count
    }

    /// Deployment environment label, seeded from `APP_ENV`.
    pub fn env(&self) -> &str {
        &self.env
    }

    /// Suppresses the default error observer's logging.
    pub fn silent(&self) -> bool {
        self.silent
    }

    /// Whether chains run inside the ambient request scope.
    pub fn expose_scope(&self) -> bool {
        self.expose_scope
    }
}

/// The application: configuration plus an ordered middleware list.
///
/// Layers are appended with [`with`](App::with); calling
/// [`dispatcher`](App::dispatcher) freezes the current list into an
/// immutable snapshot that serves requests. Layers added afterwards only
/// appear in later snapshots.
pub struct App {
    config: Config,
    middleware: Vec<Arc<dyn Middleware>>,
    error_hook: Option<ErrorHook>,
}

impl App {
    /// An application with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn env(&self) -> &str {
        &self.config.env
    }

    /// Appends a middleware layer. Layers run in registration order.
    pub fn with<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Snapshots the application into a request-serving [`Dispatcher`].
    pub fn dispatcher(&self) -> Dispatcher {
        let hook = match &self.error_hook {
            Some(hook) => Arc::clone(hook),
            None => {
                let silent = self.config.silent;
                Arc::new(move |err: &HttpError, _ctx: &Context| default_error_observer(silent, err))
                    as ErrorHook
            }
        };
        Dispatcher::new(
            Chain::new(self.middleware.clone()),
            Arc::new(self.config.clone()),
            hook,
        )
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`App`]. All settings have working defaults.
pub struct AppBuilder {
    config: Config,
    error_hook: Option<ErrorHook>,
}

impl AppBuilder {
    fn new() -> Self {
        Self { config: Config::default(), error_hook: None }
    }

    /// Trust forwarding headers from an upstream proxy.
    pub fn proxy(mut self, proxy: bool) -> Self {
        self.config.proxy = proxy;
        self
    }

    pub fn subdomain_offset(mut self, offset: usize) -> Self {
        self.config.subdomain_offset = offset;
        self
    }

    pub fn proxy_ip_header(mut self, header: HeaderName) -> Self {
        self.config.proxy_ip_header = header;
        self
    }

    pub fn max_ips_count(mut self, count: usize) -> Self {
        self.config.max_ips_count = count;
        self
    }

    pub fn env<S: Into<String>>(mut self, env: S) -> Self {
        self.config.env = env.into();
        self
    }

    /// Silence the default error observer.
    pub fn silent(mut self, silent: bool) -> Self {
        self.config.silent = silent;
        self
    }

    /// Run each chain inside the ambient request scope, making
    /// [`scope::current`](crate::scope::current) available downstream.
    pub fn expose_scope(mut self, expose: bool) -> Self {
        self.config.expose_scope = expose;
        self
    }

    /// Replaces the default error observer.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HttpError, &Context) + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> App {
        App { config: self.config, middleware: Vec::new(), error_hook: self.error_hook }
    }
}

impl std::fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppBuilder").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Default observer: log recovered failures, except the ones that are
/// routine (404s, errors already safe to show) or silenced by config.
fn default_error_observer(silent: bool, err: &HttpError) {
    if err.status() == StatusCode::NOT_FOUND || err.is_exposed() {
        return;
    }
    if silent {
        return;
    }
    error!(status = %err.status(), aborted = err.is_aborted(), cause = %err, "request failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{middleware_fn, MiddlewareFuture, Next};
    use crate::testing::{request_parts, TestRequest, TestTransport};

    #[test]
    fn defaults_match_the_documented_surface() {
        let app = App::new();
        let config = app.config();
        assert!(!config.proxy());
        assert_eq!(config.subdomain_offset(), 2);
        assert_eq!(config.proxy_ip_header().as_str(), "x-forwarded-for");
        assert_eq!(config.max_ips_count(), 0);
        assert!(!config.silent());
        assert!(!config.expose_scope());
    }

    #[test]
    fn builder_overrides_stick() {
        let app = App::builder()
            .proxy(true)
            .subdomain_offset(3)
            .proxy_ip_header(HeaderName::from_static("x-real-ip"))
            .max_ips_count(4)
            .env("staging")
            .build();
        let config = app.config();
        assert!(config.proxy());
        assert_eq!(config.subdomain_offset(), 3);
        assert_eq!(config.proxy_ip_header().as_str(), "x-real-ip");
        assert_eq!(config.max_ips_count(), 4);
        assert_eq!(app.env(), "staging");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn dispatcher_is_a_point_in_time_snapshot() {
        fn first(ctx: &mut Context, next: Next) -> MiddlewareFuture<'_> {
            Box::pin(async move {
                ctx.set_body("first");
                next.run(ctx).await
            })
        }
        fn second(ctx: &mut Context, _next: Next) -> MiddlewareFuture<'_> {
            Box::pin(async move {
                ctx.set_body("second");
                Ok(())
            })
        }

        let mut app = App::new();
        app.with(middleware_fn(first));
        let early = app.dispatcher();
        app.with(middleware_fn(second));
        let late = app.dispatcher();

        // The early snapshot never sees the layer registered after it.
        let (request, conn) = request_parts(TestRequest::get("/"));
        let mut transport = TestTransport::new();
        early.handle(request, conn, &mut transport).await;
        assert_eq!(transport.body_text(), "first");

        let (request, conn) = request_parts(TestRequest::get("/"));
        let mut transport = TestTransport::new();
        late.handle(request, conn, &mut transport).await;
        assert_eq!(transport.body_text(), "second");
    }
}
