//! Ambient access to facts about the request currently being served.
//!
//! When enabled on the application, the dispatcher runs each chain inside a
//! task-local scope. Deeply nested code can then call [`current`] without
//! threading the context through every signature. The scope is installed
//! per task, so concurrent requests never observe each other, and it ends
//! when the chain returns.

use http::Method;
use std::net::SocketAddr;

use crate::context::Context;

tokio::task_local! {
    static CURRENT: RequestScope;
}

/// Immutable snapshot of the request a task is serving. A snapshot rather
/// than the context itself: the chain holds the context exclusively while
/// it runs.
#[derive(Debug, Clone)]
pub struct RequestScope {
    method: Method,
    path: String,
    original_url: String,
    remote_addr: Option<SocketAddr>,
}

impl RequestScope {
    pub(crate) fn of(ctx: &Context) -> Self {
        Self {
            method: ctx.request().method().clone(),
            path: ctx.request().path().to_owned(),
            original_url: ctx.original_url().to_owned(),
            remote_addr: ctx.request().conn().remote_addr,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

/// Snapshot for the request this task is serving, or `None` outside a
/// scoped chain (scoping off, or code running on another task).
pub fn current() -> Option<RequestScope> {
    CURRENT.try_with(Clone::clone).ok()
}

pub(crate) async fn within<F: Future>(scope: RequestScope, fut: F) -> F::Output {
    CURRENT.scope(scope, fut).await
}
