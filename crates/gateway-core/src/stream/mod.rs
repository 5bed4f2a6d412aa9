//! The streaming subsystem (C8): SSE/ndjson frame decoding, per-provider
//! chunk dialects, a back-pressured coordinator, and crash recovery.

pub mod coordinator;
pub mod dialect;
pub mod recovery;
pub mod sse;

pub use coordinator::{run_callback, run_pull, CancellationHandle, StreamConfig, StreamMetrics, StreamOutcome};
pub use dialect::drive_ndjson_stream;
pub use recovery::{resume_stream, RecoveryRecord};
pub use sse::{drive_sse_stream, SseDecoder, SseFrame};
