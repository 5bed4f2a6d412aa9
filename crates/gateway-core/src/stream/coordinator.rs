//! The stream coordinator (C8): drives a provider adapter's chunk stream
//! with back-pressure, timeouts, optional per-chunk transform/validation,
//! cancellation, and metrics, in either pull or callback consumption mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::response::StreamChunk;

pub type TransformFn = Arc<dyn Fn(StreamChunk) -> StreamChunk + Send + Sync>;
pub type ValidateFn = Arc<dyn Fn(&StreamChunk) -> Result<(), GatewayError> + Send + Sync>;

/// Tuning knobs for one streamed call. `buffer_chunks` bounds how far the
/// producer can run ahead of a slow consumer in pull mode — a consumer that
/// reads one chunk at a time with `buffer_chunks: 1` gets true
/// chunk-at-a-time back-pressure instead of the adapter buffering the
/// entire response in memory.
#[derive(Clone)]
pub struct StreamConfig {
    pub buffer_chunks: usize,
    pub initial_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub transform_chunk: Option<TransformFn>,
    pub validate_chunk: Option<ValidateFn>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_chunks: 1,
            initial_timeout: None,
            idle_timeout: None,
            transform_chunk: None,
            validate_chunk: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamMetrics {
    pub first_byte_ms: Option<u64>,
    pub chunk_count: u64,
    pub total_bytes: u64,
    pub duration_ms: u64,
    pub tokens_per_second: Option<f64>,
}

/// A cooperative, idempotent cancellation switch shared between the
/// coordinator's driving task and whatever holds the handle. Cancelling
/// twice, or after the stream already finished, is a no-op.
#[derive(Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a finished stream produced, regardless of consumption mode: the
/// concatenated text, the final usage/finish-reason (if the last chunk
/// carried one), and timing metrics. Used to build the `RecoveryRecord` on
/// early termination and the final `LLMResponse`-shaped summary on success.
#[derive(Debug, Clone, Default)]
pub struct StreamOutcome {
    pub content: String,
    pub last_chunk: Option<StreamChunk>,
    pub metrics: StreamMetrics,
    pub cancelled: bool,
    /// Set when the underlying source stream (or a timeout) ended the
    /// stream before a terminal chunk arrived. `content`/`metrics` still
    /// reflect whatever was received before the failure, so a caller with
    /// `stream_recovery` enabled can build a [`crate::stream::recovery::RecoveryRecord`]
    /// from the partial output. Validation/transform failures never set
    /// this — those are reported as a plain `Err` from `run_callback`.
    pub error: Option<GatewayError>,
}

fn apply_pipeline(
    chunk: StreamChunk,
    transform: &Option<TransformFn>,
    validate: &Option<ValidateFn>,
) -> Result<StreamChunk, GatewayError> {
    let chunk = match transform {
        Some(f) => f(chunk),
        None => chunk,
    };
    if let Some(validator) = validate {
        validator(&chunk)?;
    }
    Ok(chunk)
}

/// Drives `source` to completion, invoking `on_chunk` for each one.
/// Returns as soon as a terminal chunk arrives, the stream ends, a
/// transport error or timeout occurs, or `handle` is cancelled — whichever
/// comes first. The `initial_timeout` bounds the wait for the very first
/// chunk; `idle_timeout` bounds the wait between any two subsequent
/// chunks. A transport failure is reported on `StreamOutcome::error`
/// rather than as an `Err`, so the caller still gets the partial
/// content/metrics; only a rejecting validator/transform produces a hard
/// `Err`.
#[tracing::instrument(name = "stream_coordinator.run_callback", skip_all)]
pub async fn run_callback<F>(
    mut source: BoxStream<'static, Result<StreamChunk, GatewayError>>,
    config: StreamConfig,
    handle: CancellationHandle,
    mut on_chunk: F,
) -> Result<StreamOutcome, GatewayError>
where
    F: FnMut(&StreamChunk),
{
    let started = Instant::now();
    let mut outcome = StreamOutcome::default();
    let mut first = true;

    loop {
        if handle.is_cancelled() {
            outcome.cancelled = true;
            break;
        }

        let timeout = if first { config.initial_timeout } else { config.idle_timeout };
        let next = match timeout {
            Some(d) => match tokio::time::timeout(d, source.next()).await {
                Ok(item) => item,
                Err(_) => {
                    outcome.error = Some(GatewayError::Timeout(if first {
                        "timed out waiting for the first stream chunk".into()
                    } else {
                        "stream went idle past the configured timeout".into()
                    }));
                    break;
                }
            },
            None => source.next().await,
        };

        let Some(item) = next else { break };
        // A transport-level error from the source stream itself (dropped
        // connection, mid-stream parse failure) is recorded on the outcome
        // rather than propagated via `?`, so the content/metrics gathered
        // so far survive for `stream_recovery` to build a partial record
        // from. A validator/transform rejecting a chunk is a different
        // failure class — a caller-supplied bug, not a transport hiccup —
        // and still surfaces as a hard `Err`.
        let raw = match item {
            Ok(raw) => raw,
            Err(err) => {
                outcome.error = Some(err);
                break;
            }
        };
        let chunk = apply_pipeline(raw, &config.transform_chunk, &config.validate_chunk)?;

        if first {
            outcome.metrics.first_byte_ms = Some(started.elapsed().as_millis() as u64);
            first = false;
        }
        outcome.metrics.chunk_count += 1;
        if let Some(text) = &chunk.content {
            outcome.metrics.total_bytes += text.len() as u64;
            outcome.content.push_str(text);
        }
        on_chunk(&chunk);

        let terminal = chunk.is_terminal();
        outcome.last_chunk = Some(chunk);
        if terminal {
            break;
        }
    }

    outcome.metrics.duration_ms = started.elapsed().as_millis() as u64;
    if let Some(usage) = outcome.last_chunk.as_ref().and_then(|c| c.usage) {
        let secs = outcome.metrics.duration_ms as f64 / 1000.0;
        if secs > 0.0 {
            outcome.metrics.tokens_per_second = Some(usage.output_tokens as f64 / secs);
        }
    }
    tracing::debug!(
        chunks = outcome.metrics.chunk_count,
        duration_ms = outcome.metrics.duration_ms,
        cancelled = outcome.cancelled,
        "stream finished"
    );
    Ok(outcome)
}

/// Pull-mode variant: returns a bounded `Receiver` the caller can pull from
/// at its own pace, applying the same back-pressure, timeout, transform,
/// and cancellation semantics as [`run_callback`] but off a spawned task so
/// the caller doesn't have to hold the producer future open between reads.
pub fn run_pull(
    source: BoxStream<'static, Result<StreamChunk, GatewayError>>,
    config: StreamConfig,
) -> (mpsc::Receiver<Result<StreamChunk, GatewayError>>, CancellationHandle) {
    let handle = CancellationHandle::new();
    let (tx, rx) = mpsc::channel(config.buffer_chunks.max(1));
    let task_handle = handle.clone();

    tokio::spawn(async move {
        let mut source = source;
        let mut first = true;
        loop {
            if task_handle.is_cancelled() {
                break;
            }
            let timeout = if first { config.initial_timeout } else { config.idle_timeout };
            let next = match timeout {
                Some(d) => match tokio::time::timeout(d, source.next()).await {
                    Ok(item) => item,
                    Err(_) => {
                        let _ = tx
                            .send(Err(GatewayError::Timeout("stream timed out".into())))
                            .await;
                        break;
                    }
                },
                None => source.next().await,
            };
            let Some(item) = next else { break };
            first = false;
            let forwarded = item.and_then(|c| apply_pipeline(c, &config.transform_chunk, &config.validate_chunk));
            let is_err_or_terminal = match &forwarded {
                Ok(c) => c.is_terminal(),
                Err(_) => true,
            };
            if tx.send(forwarded).await.is_err() {
                break; // receiver dropped
            }
            if is_err_or_terminal {
                break;
            }
        }
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(texts: &[&str]) -> BoxStream<'static, Result<StreamChunk, GatewayError>> {
        let mut items: Vec<Result<StreamChunk, GatewayError>> =
            texts.iter().map(|t| Ok(StreamChunk::text(*t))).collect();
        if let Some(last) = items.last_mut() {
            if let Ok(chunk) = last {
                chunk.finish_reason = Some(crate::response::FinishReason::Stop);
            }
        }
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn callback_mode_concatenates_content_and_terminates() {
        let source = chunks(&["hello ", "world"]);
        let mut seen = Vec::new();
        let outcome = run_callback(source, StreamConfig::default(), CancellationHandle::new(), |c| {
            if let Some(t) = &c.content {
                seen.push(t.clone());
            }
        })
        .await
        .unwrap();
        assert_eq!(outcome.content, "hello world");
        assert_eq!(outcome.metrics.chunk_count, 2);
        assert!(outcome.last_chunk.unwrap().is_terminal());
    }

    #[tokio::test]
    async fn cancellation_stops_before_terminal_chunk() {
        let source = chunks(&["a", "b", "c"]);
        let handle = CancellationHandle::new();
        handle.cancel();
        let outcome = run_callback(source, StreamConfig::default(), handle, |_| {}).await.unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.content, "");
    }

    #[tokio::test]
    async fn validator_rejecting_a_chunk_surfaces_as_an_error() {
        let source = chunks(&["bad"]);
        let mut config = StreamConfig::default();
        config.validate_chunk = Some(Arc::new(|_| Err(GatewayError::StreamParseError("nope".into()))));
        let result = run_callback(source, config, CancellationHandle::new(), |_| {}).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn transport_error_mid_stream_preserves_partial_content() {
        let items: Vec<Result<StreamChunk, GatewayError>> =
            vec![Ok(StreamChunk::text("Hel")), Err(GatewayError::NetworkError("connection reset".into()))];
        let source: BoxStream<'static, Result<StreamChunk, GatewayError>> = Box::pin(stream::iter(items));
        let outcome = run_callback(source, StreamConfig::default(), CancellationHandle::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(outcome.content, "Hel");
        assert!(matches!(outcome.error, Some(GatewayError::NetworkError(_))));
    }

    #[tokio::test]
    async fn pull_mode_delivers_chunks_in_order() {
        let source = chunks(&["1", "2"]);
        let (mut rx, _handle) = run_pull(source, StreamConfig::default());
        let first = rx.recv().await.unwrap().unwrap();
        let second = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("1"));
        assert_eq!(second.content.as_deref(), Some("2"));
        assert!(rx.recv().await.is_none());
    }
}
