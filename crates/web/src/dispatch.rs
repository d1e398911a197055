use http::header::CONTENT_TYPE;
use http::StatusCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::app::{Config, ErrorHook};
use crate::body::InboundBody;
use crate::context::Context;
use crate::error::{reason_phrase, HttpError, Result};
use crate::middleware::Chain;
use crate::request::Request;
use crate::respond;
use crate::response::{mime_value, Response};
use crate::scope::{self, RequestScope};
use crate::transport::{ConnectionInfo, Transport};

/// Immutable per-server-start snapshot of the application: the composed
/// middleware chain, the configuration and the error observer.
///
/// One dispatcher serves any number of concurrent exchanges; each call to
/// [`handle`](Dispatcher::handle) owns its context exclusively, so nothing
/// here needs locking.
#[derive(Clone)]
pub struct Dispatcher {
    chain: Chain,
    config: Arc<Config>,
    error_hook: ErrorHook,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("chain", &self.chain)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub(crate) fn new(chain: Chain, config: Arc<Config>, error_hook: ErrorHook) -> Self {
        Self { chain, config, error_hook }
    }

    /// Serves one exchange end to end: builds the context, runs the chain
    /// raced against connection loss, then finalizes or recovers. Every
    /// failure is routed through recovery, so this never returns one.
    pub async fn handle<T>(&self, request: http::Request<InboundBody>, conn: ConnectionInfo, transport: &mut T)
    where
        T: Transport + ?Sized,
    {
        let (parts, body) = request.into_parts();
        let request = Request::new(parts, body, conn, Arc::clone(&self.config));
        let mut ctx = Context::new(request, Response::new());
        // Default outcome until some layer stages anything.
        ctx.response_mut().stage_default_status(StatusCode::NOT_FOUND);

        let closed = transport.closed();
        let outcome = if self.config.expose_scope {
            let snapshot = RequestScope::of(&ctx);
            scope::within(snapshot, run_chain(&self.chain, &mut ctx, &closed)).await
        } else {
            run_chain(&self.chain, &mut ctx, &closed).await
        };

        match outcome {
            Ok(()) => {
                if let Err(err) = respond::respond(&mut ctx, transport).await {
                    self.recover(&mut ctx, err, transport).await;
                }
            }
            Err(err) => self.recover(&mut ctx, err, transport).await,
        }
    }

    /// Error path shared by chain failures and finalize failures.
    ///
    /// An aborted exchange, a head already on the wire, or an unwritable
    /// peer make the error unrecoverable: it is marked as such before the
    /// observer fires, and nothing further is written. Otherwise the staged
    /// response is replaced wholesale by a plain-text rendition of the
    /// error.
    async fn recover<T>(&self, ctx: &mut Context, mut err: HttpError, transport: &mut T)
    where
        T: Transport + ?Sized,
    {
        let unrecoverable = err.is_aborted()
            || transport.headers_sent()
            || ctx.response().committed()
            || !transport.writable();
        if unrecoverable {
            err.set_headers_sent();
        }

        (self.error_hook)(&err, ctx);

        if unrecoverable {
            return;
        }

        let status = err.status();
        let message =
            if err.is_exposed() { err.message().to_owned() } else { reason_phrase(status) };

        {
            let res = ctx.response_mut();
            res.clear_headers();
            if let Some(headers) = err.headers() {
                for (name, value) in headers {
                    res.headers_mut().insert(name.clone(), value.clone());
                }
            }
            res.set_status(status);
            res.headers_mut().insert(CONTENT_TYPE, mime_value(&mime::TEXT_PLAIN_UTF_8));
            res.stage_content_length(message.len() as u64);
        }

        if let Err(write_err) = respond::write_payload(ctx, transport, message.into()).await {
            warn!(cause = %write_err, "failed to write the error response");
        }
    }
}

/// Races the chain against the peer disappearing. `biased` keeps the check
/// order deterministic: a lost peer wins over a completed chain.
async fn run_chain(chain: &Chain, ctx: &mut Context, closed: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        () = closed.cancelled() => Err(HttpError::connection_aborted()),
        outcome = chain.dispatch(ctx) => outcome,
    }
}
