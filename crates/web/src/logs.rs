use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use repoforge_bus::log::{channel_for, classify_message, read_log_prefix, resolve_default_timestamp, LogEvent};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::WebError;
use crate::state::AppState;

/// How long to keep forwarding lines after `END` before closing the
/// response, in case a few trailing lines were still in flight.
const END_GRACE: Duration = Duration::from_secs(1);

fn valid_pkgbase(pkgbase: &str) -> bool {
    !pkgbase.is_empty() && pkgbase.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

/// `GET /api/logs/:pkgbase/:ts`. Axum's `Path` extractor percent-decodes the
/// raw path segments before handing them to us, so a client-escaped `%2B`
/// already reads as `+` here.
pub async fn by_timestamp(
    State(state): State<AppState>,
    Path((pkgbase, ts)): Path<(String, String)>,
) -> Result<Response, WebError> {
    if !valid_pkgbase(&pkgbase) {
        return Err(WebError::BadRequest(format!("invalid pkgbase: {pkgbase:?}")));
    }
    if ts.is_empty() || !ts.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WebError::BadRequest(format!("invalid timestamp: {ts:?}")));
    }
    let timestamp: i64 = ts
        .parse()
        .map_err(|_| WebError::BadRequest(format!("invalid timestamp: {ts:?}")))?;
    stream_log(state, pkgbase, timestamp).await
}

/// `GET /api/logs/:pkgbase` — resolves the pkgbase's default timestamp, then
/// delegates to the same streaming path.
pub async fn by_default(
    State(state): State<AppState>,
    Path(pkgbase): Path<String>,
) -> Result<Response, WebError> {
    if !valid_pkgbase(&pkgbase) {
        return Err(WebError::BadRequest(format!("invalid pkgbase: {pkgbase:?}")));
    }
    let timestamp = resolve_default_timestamp(&*state.bus, &pkgbase)
        .await?
        .ok_or_else(|| WebError::NotFound(format!("no default build for {pkgbase:?}")))?;
    stream_log(state, pkgbase, timestamp).await
}

async fn stream_log(state: AppState, pkgbase: String, timestamp: i64) -> Result<Response, WebError> {
    if !state.coordinator.job_exists(&pkgbase, timestamp).await? {
        return Err(WebError::NotFound(format!("no build {pkgbase}@{timestamp}")));
    }

    // Subscribe before reading the stored prefix so nothing published in
    // between is lost (the bus's append+publish+expire pipelining makes the
    // two reads together an exact union with no duplication).
    let mut sub = state.bus.subscribe(&channel_for(&pkgbase, timestamp)).await?;
    let prefix = read_log_prefix(&*state.bus, &pkgbase, timestamp).await?;

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(32);
    tokio::spawn(async move {
        if !prefix.is_empty() && tx.send(Ok(Bytes::from(prefix))).await.is_err() {
            return;
        }
        loop {
            match sub.recv().await {
                Some(raw) => match classify_message(&raw) {
                    LogEvent::Chunk(bytes) => {
                        if tx.send(Ok(Bytes::from(bytes))).await.is_err() {
                            return;
                        }
                    }
                    LogEvent::End => break,
                },
                None => return,
            }
        }
        // Grace period: a line published just before `END` may still be
        // queued behind it on the channel.
        let deadline = tokio::time::Instant::now() + END_GRACE;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return;
            }
            match tokio::time::timeout(remaining, sub.recv()).await {
                Ok(Some(raw)) => {
                    if let LogEvent::Chunk(bytes) = classify_message(&raw) {
                        if tx.send(Ok(Bytes::from(bytes))).await.is_err() {
                            return;
                        }
                    }
                }
                _ => return,
            }
        }
    });

    Ok(Body::from_stream(ReceiverStream::new(rx)).into_response())
}
