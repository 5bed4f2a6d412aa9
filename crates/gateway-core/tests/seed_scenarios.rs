//! End-to-end seed scenarios against the in-process mock provider, no
//! network required. One test per numbered scenario in the design notes.

use std::sync::Arc;
use std::time::Duration;

use gateway_core::circuit::CircuitConfig;
use gateway_core::facade::GatewayBuilder;
use gateway_core::message::Message;
use gateway_core::options::RequestOptions;
use gateway_core::response::{FinishReason, LLMResponse, StreamChunk, Usage};
use gateway_core::stream::sse::SseDecoder;
use gateway_core::stream::{dialect, run_callback, CancellationHandle, StreamConfig};
use gateway_core::GatewayError;
use gateway_provider_mock::MockProvider;

fn mock_gateway() -> (Arc<MockProvider>, gateway_core::Gateway) {
    let mock = Arc::new(MockProvider::new());
    let gateway = GatewayBuilder::new().register_adapter("mock", mock.clone() as Arc<dyn gateway_core::ProviderAdapter>).build();
    (mock, gateway)
}

/// Scenario 1 — basic chat.
#[tokio::test]
async fn basic_chat_against_the_mock_provider() {
    let (mock, gateway) = mock_gateway();
    let response = gateway
        .chat("mock", vec![Message::user("Hello")], RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(response.content, "Hello from mock!");
    assert_eq!(response.usage.total_tokens, 15);
    assert!(response.cost.is_some(), "mock pricing is seeded, cost should attach");
    assert_eq!(mock.call_count(), 1);
}

/// Scenario 2 — cache hit.
#[tokio::test]
async fn two_identical_cached_calls_hit_the_adapter_once() {
    let (mock, gateway) = mock_gateway();
    let options = RequestOptions::default().cache(true);

    let first = gateway.chat("mock", vec![Message::user("Hello")], options.clone()).await.unwrap();
    let second = gateway.chat("mock", vec![Message::user("Hello")], options).await.unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(mock.call_count(), 1);
    let (hits, misses) = gateway.registries().cache.stats();
    assert_eq!((hits, misses), (1, 1));
}

/// Scenario 3 — retry then success.
#[tokio::test]
async fn retries_past_two_server_errors_then_succeeds() {
    let (mock, gateway) = mock_gateway();
    mock.queue_error(GatewayError::ServerError { status: 503, message: "busy".into() });
    mock.queue_error(GatewayError::ServerError { status: 503, message: "busy".into() });
    mock.queue_response(LLMResponse::new("third time's the charm", "mock-model", Usage::new(3, 4)));

    let mut options = RequestOptions::default();
    options.retry_count = Some(3);
    options.retry_delay = Some(10);
    options.retry_jitter = Some(false);

    let response = gateway.chat("mock", vec![Message::user("hi")], options).await.unwrap();
    assert_eq!(response.content, "third time's the charm");
    assert_eq!(mock.call_count(), 3);
}

/// Scenario 4 — non-retryable error surfaces immediately.
#[tokio::test]
async fn authentication_error_is_not_retried() {
    let (mock, gateway) = mock_gateway();
    mock.queue_error(GatewayError::AuthenticationError("bad key".into()));

    let result = gateway.chat("mock", vec![Message::user("hi")], RequestOptions::default()).await;
    assert!(matches!(result, Err(GatewayError::AuthenticationError(_))));
    assert_eq!(mock.call_count(), 1);
}

/// Scenario 5 — OpenAI-style SSE stream order and termination.
#[tokio::test]
async fn openai_sse_stream_delivers_chunks_in_order_then_terminates() {
    let mut decoder = SseDecoder::new();
    let raw = b"data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\", \"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"world!\"},\"finish_reason\":\"stop\"}]}\n\n\
data: [DONE]\n\n";

    let frames = decoder.feed(raw);
    let mut chunks = Vec::new();
    for frame in frames {
        if let Some(chunk) = dialect::openai_chunk(&frame.data).unwrap() {
            chunks.push(chunk);
        }
    }

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].content.as_deref(), Some("Hello"));
    assert_eq!(chunks[1].content.as_deref(), Some(", "));
    assert_eq!(chunks[2].content.as_deref(), Some("world!"));
    assert_eq!(chunks[2].finish_reason, Some(FinishReason::Stop));
    assert!(chunks[2].is_terminal());

    let mut seen = Vec::new();
    let source = Box::pin(futures::stream::iter(chunks.clone().into_iter().map(Ok)));
    let outcome = run_callback(source, StreamConfig::default(), CancellationHandle::new(), |c| {
        if let Some(text) = &c.content {
            seen.push(text.clone());
        }
    })
    .await
    .unwrap();

    assert_eq!(seen, vec!["Hello", ", ", "world!"]);
    assert_eq!(outcome.content, "Hello, world!");
    assert!(outcome.last_chunk.unwrap().is_terminal());
}

/// Scenario 6 — stream recovery after a mid-stream transport failure.
#[tokio::test]
async fn interrupted_stream_is_recoverable_and_resumable() {
    let mock = Arc::new(MockProvider::new());
    let gateway = GatewayBuilder::new().register_adapter("mock", mock.clone() as Arc<dyn gateway_core::ProviderAdapter>).build();

    mock.queue_stream(vec![
        Ok(StreamChunk::text("Hel")),
        Err(GatewayError::NetworkError("connection reset".into())),
    ]);

    let mut options = RequestOptions::default();
    options.stream_recovery = Some(true);

    let mut seen = String::new();
    let result = gateway
        .stream("mock", vec![Message::user("tell me a story")], options, |c| {
            if let Some(t) = &c.content {
                seen.push_str(t);
            }
        })
        .await;

    let recovery_id = match result {
        Err(GatewayError::RecoverableStreamError { recovery_id, .. }) => recovery_id,
        other => panic!("expected a recoverable stream error, got {other:?}"),
    };
    assert_eq!(seen, "Hel");
    assert_eq!(gateway.list_recoverable_streams(), vec![recovery_id.clone()]);

    mock.queue_stream(vec![{
        let mut chunk = StreamChunk::text("lo, world!");
        chunk.finish_reason = Some(FinishReason::Stop);
        Ok(chunk)
    }]);

    let mut resumed = String::new();
    let outcome = gateway
        .resume_stream(&recovery_id, gateway_core::options::RecoveryStrategy::Exact, RequestOptions::default(), |c| {
            if let Some(t) = &c.content {
                resumed.push_str(t);
            }
        })
        .await
        .unwrap();

    assert_eq!(resumed, "lo, world!");
    assert_eq!(outcome.content, "lo, world!");
    assert!(gateway.list_recoverable_streams().is_empty());
    assert_eq!(format!("{seen}{resumed}"), "Hello, world!");
}

/// Scenario 7 — circuit trips open after a run of failures and rejects
/// without invoking the adapter again; a probe is admitted after the reset
/// timeout elapses.
#[tokio::test]
async fn circuit_opens_after_threshold_failures_and_recovers() {
    let mock = Arc::new(MockProvider::new());
    let gateway = GatewayBuilder::new()
        .with_default_circuit_config(CircuitConfig {
            failure_threshold: 3,
            success_threshold: 1,
            reset_timeout: Duration::from_millis(20),
            ..CircuitConfig::default()
        })
        .register_adapter("mock", mock.clone() as Arc<dyn gateway_core::ProviderAdapter>)
        .build();

    for _ in 0..3 {
        mock.queue_error(GatewayError::ServerError { status: 503, message: "busy".into() });
        let mut options = RequestOptions::default();
        options.retry = Some(false);
        let result = gateway.chat("mock", vec![Message::user("hi")], options).await;
        assert!(result.is_err());
    }
    assert_eq!(mock.call_count(), 3);

    let mut options = RequestOptions::default();
    options.retry = Some(false);
    let rejected = gateway.chat("mock", vec![Message::user("hi")], options).await;
    assert!(matches!(rejected, Err(GatewayError::CircuitOpen(_))));
    assert_eq!(mock.call_count(), 3, "circuit-open rejection must not reach the adapter");

    tokio::time::sleep(Duration::from_millis(30)).await;

    mock.queue_response(LLMResponse::new("recovered", "mock-model", Usage::new(1, 1)));
    let mut options = RequestOptions::default();
    options.retry = Some(false);
    let probe = gateway.chat("mock", vec![Message::user("hi")], options).await.unwrap();
    assert_eq!(probe.content, "recovered");
    assert_eq!(mock.call_count(), 4);
}

/// Scenario 8 — bulkhead admits `max_concurrent`, queues up to `max_queued`,
/// and times out the rest, without leaking slots.
#[tokio::test]
async fn bulkhead_admits_queues_and_times_out_without_leaking_slots() {
    use gateway_core::circuit::Circuit;

    // The queue timeout must comfortably outlast how long an admitted
    // caller holds its slot, or the queued caller would time out waiting
    // for a slot that does eventually free up — that would make this test
    // flaky rather than exercise the "queues and then executes" path.
    let circuit = Arc::new(Circuit::new(CircuitConfig {
        max_concurrent: 2,
        max_queued: 1,
        queue_timeout: Duration::from_millis(300),
        ..CircuitConfig::default()
    }));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let circuit = Arc::clone(&circuit);
        handles.push(tokio::spawn(async move {
            let permit = circuit.acquire_async().await;
            if let Ok(permit) = permit {
                tokio::time::sleep(Duration::from_millis(60)).await;
                drop(permit);
                true
            } else {
                false
            }
        }));
    }

    let mut succeeded = 0;
    let mut failed = 0;
    for h in handles {
        if h.await.unwrap() {
            succeeded += 1;
        } else {
            failed += 1;
        }
    }

    assert_eq!(succeeded, 3, "two immediate admits plus one queued-then-admitted");
    assert_eq!(failed, 1, "the fourth caller exceeds max_concurrent + max_queued and times out");
    assert_eq!(circuit.in_flight(), 0, "no slot leaked past completion");
    assert_eq!(circuit.queued(), 0, "no queue slot leaked past completion");
}
