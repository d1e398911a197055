use bytes::Bytes;
use http::header::{CONTENT_TYPE, TRANSFER_ENCODING};
use http::{Method, Version};
use http_body_util::BodyExt;
use tracing::trace;

use crate::body::Body;
use crate::context::Context;
use crate::error::{reason_phrase, Result};
use crate::response::{bodyless_status, mime_value};
use crate::transport::Transport;

/// Turns the staged response into transport writes.
///
/// Decision order: opted-out or unwritable exchanges are left alone, then
/// bodyless statuses, then HEAD, then the empty-body fallbacks, then the
/// staged payload by kind. The head is sent exactly once and the facade is
/// marked committed immediately after.
pub(crate) async fn respond<T>(ctx: &mut Context, transport: &mut T) -> Result<()>
where
    T: Transport + ?Sized,
{
    if !ctx.auto_respond() {
        trace!("auto-respond disabled, middleware owns the transport");
        return Ok(());
    }
    if !transport.writable() {
        trace!("transport unwritable, skipping finalize");
        return Ok(());
    }

    let status = ctx.response().status();

    if bodyless_status(status) {
        ctx.response_mut().set_body(Body::Empty);
        return write_head_only(ctx, transport).await;
    }

    if ctx.request().method() == Method::HEAD {
        if !ctx.response().has("content-length") {
            if let Some(length) = ctx.response().length() {
                ctx.response_mut().stage_content_length(length);
            }
        }
        return write_head_only(ctx, transport).await;
    }

    match ctx.response_mut().take_body() {
        Body::Empty => {
            if ctx.response().is_explicit_empty() {
                // Entity headers staged after the body was emptied do not
                // survive to the wire.
                let res = ctx.response_mut();
                res.remove(CONTENT_TYPE);
                res.remove(TRANSFER_ENCODING);
                res.stage_content_length(0);
                return write_head_only(ctx, transport).await;
            }
            // Nothing was staged at all: answer with the status text.
            let message = if ctx.request().version() >= Version::HTTP_2 {
                status.as_u16().to_string()
            } else {
                reason_phrase(status)
            };
            let res = ctx.response_mut();
            res.headers_mut().insert(CONTENT_TYPE, mime_value(&mime::TEXT_PLAIN_UTF_8));
            res.stage_content_length(message.len() as u64);
            write_payload(ctx, transport, Bytes::from(message)).await
        }
        Body::Text(text) => {
            ensure_length(ctx, text.len() as u64);
            write_payload(ctx, transport, Bytes::from(text)).await
        }
        Body::Bytes(bytes) => {
            ensure_length(ctx, bytes.len() as u64);
            write_payload(ctx, transport, bytes).await
        }
        Body::Json(value) => {
            let buf = serde_json::to_vec(&value)?;
            ensure_length(ctx, buf.len() as u64);
            write_payload(ctx, transport, Bytes::from(buf)).await
        }
        Body::Stream(mut stream) => {
            send_head(ctx, transport).await?;
            while let Some(frame) = stream.frame().await {
                let frame = frame?;
                if let Ok(data) = frame.into_data() {
                    transport.send_chunk(data).await?;
                }
            }
            transport.end().await?;
            Ok(())
        }
    }
}

/// Stages a content length unless one is set or the transfer is chunked.
fn ensure_length(ctx: &mut Context, length: u64) {
    let staged = ctx.response().has("content-length") || ctx.response().has("transfer-encoding");
    if !staged {
        ctx.response_mut().stage_content_length(length);
    }
}

async fn send_head<T>(ctx: &mut Context, transport: &mut T) -> Result<()>
where
    T: Transport + ?Sized,
{
    let status = ctx.response().status();
    transport.send_head(status, ctx.response().headers()).await?;
    ctx.response_mut().mark_committed();
    Ok(())
}

async fn write_head_only<T>(ctx: &mut Context, transport: &mut T) -> Result<()>
where
    T: Transport + ?Sized,
{
    send_head(ctx, transport).await?;
    transport.end().await?;
    Ok(())
}

pub(crate) async fn write_payload<T>(ctx: &mut Context, transport: &mut T, payload: Bytes) -> Result<()>
where
    T: Transport + ?Sized,
{
    send_head(ctx, transport).await?;
    transport.send_chunk(payload).await?;
    transport.end().await?;
    Ok(())
}
