use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Future, Stream};

use easel_core::errors::GatewayError;
use easel_core::stream::StreamEvent;

pub(crate) const SSE_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Event name used for frames that carry no `event:` line.
pub const DEFAULT_EVENT: &str = "message";

/// Provider-specific translation of SSE frames into stream events.
pub trait SseDecoder: Send + 'static {
    fn decode(&mut self, event_type: &str, data: &str) -> Vec<StreamEvent>;

    /// Called once when the byte stream ends cleanly.
    fn finish(&mut self) -> Vec<StreamEvent> {
        Vec::new()
    }
}

/// Parse raw SSE text into (event_type, data) pairs.
///
/// Multi-line `data:` fields are joined with `\n`. Comment lines (`:`) are
/// skipped. A frame without an `event:` line is reported as [`DEFAULT_EVENT`].
pub fn parse_sse_lines(raw: &str) -> Vec<(String, String)> {
    let mut events = Vec::new();
    let mut current_event = String::new();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            flush_frame(&mut events, &mut current_event, &mut data_lines);
        } else if line.starts_with(':') {
            continue;
        } else if let Some(event) = field(line, "event") {
            current_event = event.to_string();
        } else if let Some(data) = field(line, "data") {
            data_lines.push(data);
        }
    }

    flush_frame(&mut events, &mut current_event, &mut data_lines);
    events
}

fn flush_frame(events: &mut Vec<(String, String)>, event: &mut String, data: &mut Vec<&str>) {
    if !data.is_empty() || !event.is_empty() {
        let name = if event.is_empty() { DEFAULT_EVENT.to_string() } else { std::mem::take(event) };
        events.push((name, data.join("\n")));
    }
    data.clear();
}

fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Offset just past the first blank line (`\n\n` or `\n\r\n`), if any.
fn frame_end(buf: &[u8]) -> Option<usize> {
    for (i, &b) in buf.iter().enumerate() {
        if b != b'\n' {
            continue;
        }
        match &buf[i + 1..] {
            [b'\n', ..] => return Some(i + 2),
            [b'\r', b'\n', ..] => return Some(i + 3),
            _ => {}
        }
    }
    None
}

/// Wraps a byte stream from reqwest and yields StreamEvents through a decoder.
/// If no bytes arrive within the idle window, yields an error and ends.
pub struct SseStream<D> {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    decoder: D,
    buffer: BytesMut,
    pending: VecDeque<StreamEvent>,
    idle_deadline: Pin<Box<tokio::time::Sleep>>,
    idle_duration: Duration,
    finished: bool,
}

impl<D: SseDecoder> SseStream<D> {
    pub fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
        decoder: D,
    ) -> Self {
        Self::with_idle_timeout(byte_stream, decoder, SSE_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
        decoder: D,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            decoder,
            buffer: BytesMut::with_capacity(8192),
            pending: VecDeque::new(),
            idle_deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            idle_duration: idle_timeout,
            finished: false,
        }
    }

    /// Frames are cut at the byte level so a multi-byte character split
    /// across network chunks is decoded only once it is whole.
    fn drain_complete_frames(&mut self) {
        while let Some(end) = frame_end(&self.buffer) {
            let frame = self.buffer.split_to(end);
            self.decode_chunk(&String::from_utf8_lossy(&frame));
        }
    }

    fn decode_chunk(&mut self, chunk: &str) {
        for (event_type, data) in parse_sse_lines(chunk) {
            let events = self.decoder.decode(&event_type, &data);
            self.pending.extend(events);
        }
    }

    fn fail(&mut self, error: GatewayError) -> Poll<Option<StreamEvent>> {
        self.finished = true;
        self.pending.clear();
        Poll::Ready(Some(StreamEvent::Error { error }))
    }
}

impl<D: SseDecoder + Unpin> Stream for SseStream<D> {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(event) = this.pending.pop_front() {
                if event.is_terminal() {
                    this.finished = true;
                    this.pending.clear();
                }
                return Poll::Ready(Some(event));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let deadline = tokio::time::Instant::now() + this.idle_duration;
                    this.idle_deadline.as_mut().reset(deadline);

                    this.buffer.extend_from_slice(&bytes);
                    this.drain_complete_frames();
                }
                Poll::Ready(Some(Err(e))) => {
                    return this.fail(GatewayError::StreamInterrupted(e.to_string()));
                }
                Poll::Ready(None) => {
                    if !this.buffer.is_empty() {
                        let remaining = this.buffer.split();
                        this.decode_chunk(&String::from_utf8_lossy(&remaining));
                    }
                    let tail = this.decoder.finish();
                    this.pending.extend(tail);
                    this.finished = true;
                }
                Poll::Pending => {
                    if this.idle_deadline.as_mut().poll(cx).is_ready() {
                        return this.fail(GatewayError::StreamInterrupted(format!(
                            "idle timeout after {}s",
                            this.idle_duration.as_secs()
                        )));
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_core::messages::{AssistantMessage, StopReason};
    use futures::StreamExt;

    /// Echoes each data payload as a text delta; `end` frames finish the reply.
    #[derive(Default)]
    struct EchoDecoder;

    impl SseDecoder for EchoDecoder {
        fn decode(&mut self, event_type: &str, data: &str) -> Vec<StreamEvent> {
            if event_type == "end" {
                return vec![StreamEvent::Done {
                    message: AssistantMessage::text(data),
                    stop_reason: StopReason::EndTurn,
                }];
            }
            vec![StreamEvent::TextDelta { delta: data.to_string() }]
        }
    }

    #[test]
    fn parse_named_events() {
        let raw = "event: message_start\ndata: {\"hello\":true}\n\nevent: message_stop\ndata: {}\n\n";
        let events = parse_sse_lines(raw);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ("message_start".to_string(), "{\"hello\":true}".to_string()));
        assert_eq!(events[1].0, "message_stop");
    }

    #[test]
    fn parse_data_only_frames_use_default_event() {
        let raw = "data: {\"a\":1}\n\ndata:[DONE]\n\n";
        let events = parse_sse_lines(raw);
        assert_eq!(events, vec![
            (DEFAULT_EVENT.to_string(), "{\"a\":1}".to_string()),
            (DEFAULT_EVENT.to_string(), "[DONE]".to_string()),
        ]);
    }

    #[test]
    fn parse_skips_comments_and_joins_multiline_data() {
        let raw = ": keep-alive\n\ndata: line one\ndata: line two\n\n";
        let events = parse_sse_lines(raw);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, "line one\nline two");
    }

    #[test]
    fn parse_trailing_frame_without_blank_line() {
        let events = parse_sse_lines("event: ping\ndata: x");
        assert_eq!(events, vec![("ping".to_string(), "x".to_string())]);
    }

    #[tokio::test]
    async fn frames_split_across_chunks_are_reassembled() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from("data: hel")),
            Ok(Bytes::from("lo\n\ndata: world\n")),
            Ok(Bytes::from("\nevent: end\ndata: bye\n\n")),
        ];
        let stream = SseStream::new(futures::stream::iter(chunks), EchoDecoder);
        let events: Vec<StreamEvent> = stream.collect().await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::TextDelta { delta } if delta == "hello"));
        assert!(matches!(&events[1], StreamEvent::TextDelta { delta } if delta == "world"));
        assert!(matches!(&events[2], StreamEvent::Done { .. }));
    }

    #[tokio::test]
    async fn multibyte_char_split_across_chunks() {
        let raw = "data: 你好\n\nevent: end\ndata: 完成\r\n\r\n".as_bytes();
        // Byte 7 falls inside the first character.
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::copy_from_slice(&raw[..7])),
            Ok(Bytes::copy_from_slice(&raw[7..])),
        ];
        let stream = SseStream::new(futures::stream::iter(chunks), EchoDecoder);
        let events: Vec<StreamEvent> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::TextDelta { delta } if delta == "你好"));
        match &events[1] {
            StreamEvent::Done { message, .. } => assert_eq!(message.text_content(), "完成"),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn frame_end_handles_both_line_endings() {
        assert_eq!(frame_end(b"data: a\n\nrest"), Some(9));
        assert_eq!(frame_end(b"data: a\r\n\r\nrest"), Some(11));
        assert_eq!(frame_end(b"data: a\n"), None);
    }

    #[tokio::test]
    async fn nothing_after_terminal_event() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> =
            vec![Ok(Bytes::from("event: end\ndata: x\n\ndata: late\n\n"))];
        let stream = SseStream::new(futures::stream::iter(chunks), EchoDecoder);
        let events: Vec<StreamEvent> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    #[tokio::test]
    async fn idle_timeout_fires_when_no_data() {
        tokio::time::pause();

        let byte_stream = futures::stream::pending::<Result<Bytes, reqwest::Error>>();
        let mut stream = Box::pin(SseStream::with_idle_timeout(
            byte_stream,
            EchoDecoder,
            Duration::from_secs(5),
        ));

        tokio::time::advance(Duration::from_secs(6)).await;

        let event = stream.next().await;
        assert!(
            matches!(&event, Some(StreamEvent::Error { error: GatewayError::StreamInterrupted(msg) }) if msg.contains("idle timeout")),
            "expected idle timeout error, got: {event:?}"
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn idle_timeout_resets_on_data() {
        tokio::time::pause();

        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, reqwest::Error>>(16);
        let rx_stream = tokio_stream::wrappers::ReceiverStream::new(rx);
        let mut stream = Box::pin(SseStream::with_idle_timeout(
            rx_stream,
            EchoDecoder,
            Duration::from_secs(5),
        ));

        tx.send(Ok(Bytes::from("data: ping\n\n"))).await.unwrap();
        let _ = stream.next().await;

        tokio::time::advance(Duration::from_secs(4)).await;

        tx.send(Ok(Bytes::from("data: pong\n\n"))).await.unwrap();
        let _ = stream.next().await;

        drop(tx);
        let event = stream.next().await;
        assert!(event.is_none(), "expected stream end, got: {event:?}");
    }
}
