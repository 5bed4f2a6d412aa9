//! A minimal Server-Sent-Events frame decoder.
//!
//! Providers that stream over SSE (OpenAI, Anthropic) hand the coordinator
//! raw bytes off the wire; this turns them into `(event, data, id)` frames
//! per the SSE spec: fields are `\n`-separated `key: value` lines, multiple
//! `data:` lines in one frame are joined with `\n`, and a blank line
//! terminates the frame. Partial frames spanning a chunk boundary are
//! retained in `buffer` until more bytes arrive.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

#[derive(Default)]
pub struct SseDecoder {
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of raw bytes (assumed UTF-8, replacing invalid
    /// sequences rather than failing — providers occasionally split a
    /// multi-byte character across TCP segments) and returns every complete
    /// frame it can now extract. Any trailing partial frame stays buffered.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut frames = Vec::new();

        loop {
            let Some(idx) = find_frame_boundary(&self.buffer) else {
                break;
            };
            let raw_frame: String = self.buffer.drain(..idx).collect();
            // Consume the blank-line terminator itself (either "\n\n" or
            // "\r\n\r\n") that `find_frame_boundary` located.
            consume_terminator(&mut self.buffer);

            if let Some(frame) = parse_frame(&raw_frame) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Drains and parses whatever is left in the buffer as a final,
    /// unterminated frame — used when the provider closes the connection
    /// without a trailing blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let raw = std::mem::take(&mut self.buffer);
        if raw.trim().is_empty() {
            None
        } else {
            parse_frame(&raw)
        }
    }
}

fn find_frame_boundary(buffer: &str) -> Option<usize> {
    buffer.find("\n\n").map(|i| i).or_else(|| buffer.find("\r\n\r\n"))
}

fn consume_terminator(buffer: &mut String) {
    if let Some(rest) = buffer.strip_prefix("\r\n\r\n") {
        *buffer = rest.to_string();
    } else if let Some(rest) = buffer.strip_prefix("\n\n") {
        *buffer = rest.to_string();
    }
}

fn parse_frame(raw: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut id = None;
    let mut data_lines = Vec::new();

    for line in raw.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value.to_string()),
            "id" => id = Some(value.to_string()),
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() && id.is_none() {
        return None;
    }

    Some(SseFrame {
        event,
        data: data_lines.join("\n"),
        id,
    })
}

/// Drives a raw byte stream through an [`SseDecoder`] and a per-provider
/// frame parser, producing a [`StreamChunk`](crate::response::StreamChunk)
/// stream. This is the shared half of "decode bytes into chunks" — the
/// `parse` closure is the provider-specific dialect (see
/// [`crate::stream::dialect`]); everything about buffering partial frames
/// across network reads lives here once instead of once per provider crate.
///
/// `parse` returning `Ok(None)` is a no-op frame (keep-alive, or an
/// explicit end-of-stream marker like OpenAI's `[DONE]`); the driver simply
/// doesn't emit anything for it and keeps reading.
pub fn drive_sse_stream<S, F>(
    mut bytes: S,
    mut parse: F,
) -> futures::stream::BoxStream<'static, Result<crate::response::StreamChunk, crate::error::GatewayError>>
where
    S: futures::Stream<Item = Result<bytes::Bytes, crate::error::GatewayError>> + Send + Unpin + 'static,
    F: FnMut(Option<&str>, &str) -> Result<Option<crate::response::StreamChunk>, crate::error::GatewayError>
        + Send
        + 'static,
{
    use futures::StreamExt;

    let state = (SseDecoder::new(), std::collections::VecDeque::new(), false);

    futures::stream::unfold((bytes, state, parse), move |(mut bytes, mut state, mut parse)| async move {
        loop {
            let (decoder, queue, finished) = &mut state;
            if let Some(frame) = queue.pop_front() {
                return Some((frame, (bytes, state, parse)));
            }
            if *finished {
                return None;
            }

            match bytes.next().await {
                Some(Ok(chunk)) => {
                    for frame in decoder.feed(&chunk) {
                        match parse(frame.event.as_deref(), &frame.data) {
                            Ok(Some(c)) => queue.push_back(Ok(c)),
                            Ok(None) => {}
                            Err(e) => queue.push_back(Err(e)),
                        }
                    }
                }
                Some(Err(e)) => {
                    *finished = true;
                    queue.push_back(Err(e));
                }
                None => {
                    *finished = true;
                    if let Some(frame) = decoder.finish() {
                        match parse(frame.event.as_deref(), &frame.data) {
                            Ok(Some(c)) => queue.push_back(Ok(c)),
                            Ok(None) => {}
                            Err(e) => queue.push_back(Err(e)),
                        }
                    }
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_single_frame() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"event: message\ndata: hello\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("message"));
        assert_eq!(frames[0].data, "hello");
    }

    #[test]
    fn joins_multiple_data_lines() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"data: line one\ndata: line two\n\n");
        assert_eq!(frames[0].data, "line one\nline two");
    }

    #[test]
    fn retains_partial_frame_across_feeds() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: par").is_empty());
        let frames = decoder.feed(b"tial\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "partial");
    }

    #[test]
    fn comment_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b": keep-alive\ndata: hi\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "hi");
    }

    #[test]
    fn finish_parses_an_unterminated_trailing_frame() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"data: no trailing blank line");
        let frame = decoder.finish().unwrap();
        assert_eq!(frame.data, "no trailing blank line");
    }

    #[tokio::test]
    async fn drive_sse_stream_splits_frames_across_chunks() {
        use futures::StreamExt;

        let raw = [
            bytes::Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n"),
            bytes::Bytes::from_static(b"\ndata: [DONE]\n\n"),
        ];
        let source = futures::stream::iter(raw.into_iter().map(Ok::<_, crate::error::GatewayError>));

        let chunks: Vec<_> = drive_sse_stream(source, |_event, data| crate::stream::dialect::openai_chunk(data))
            .collect()
            .await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().content.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn drive_sse_stream_propagates_parse_errors() {
        use futures::StreamExt;

        let source = futures::stream::iter(vec![Ok::<_, crate::error::GatewayError>(bytes::Bytes::from_static(
            b"data: not json\n\n",
        ))]);

        let chunks: Vec<_> = drive_sse_stream(source, |_event, data| crate::stream::dialect::openai_chunk(data))
            .collect()
            .await;

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_err());
    }
}
