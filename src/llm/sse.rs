//! Incremental decoding of `text/event-stream` completion bodies.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, BoxStream, Stream, StreamExt};

use super::client::LlmError;
use super::types::StreamChunk;

#[derive(Debug, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Splits raw body bytes into `data:` events. Lines may arrive split across
/// chunks, including inside a multi-byte UTF-8 sequence.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(event) = parse_line(&line[..line.len() - 1]) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing line that had no terminating newline.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(&rest).into_iter().collect()
    }
}

fn parse_line(raw: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.strip_suffix('\r').unwrap_or(&line);
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data == "[DONE]" {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}

/// Text carried by one `data:` payload, or the error it reports.
fn chunk_text(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| LlmError::Stream(format!("malformed stream chunk: {e}")))?;
    if let Some(err) = &chunk.error {
        let message = err
            .message
            .clone()
            .unwrap_or_else(|| "unknown stream error".to_string());
        return Err(LlmError::Stream(message));
    }
    Ok(chunk.text().map(str::to_string))
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    exhausted: bool,
}

/// Turns a completion body into a lazy stream of text fragments.
///
/// Body chunks are read only when the caller polls for the next fragment.
/// The stream ends at `[DONE]`, at end of body, or right after the first
/// error it yields.
pub fn fragments<S, B>(body: S) -> BoxStream<'static, Result<String, LlmError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                let data = match event {
                    SseEvent::Done => return None,
                    SseEvent::Data(data) => data,
                };
                match chunk_text(&data) {
                    Ok(Some(text)) => return Some((Ok(text), state)),
                    Ok(None) => continue,
                    Err(e) => {
                        state.pending.clear();
                        state.exhausted = true;
                        return Some((Err(e), state));
                    }
                }
            }
            if state.exhausted {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(chunk.as_ref());
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    return Some((Err(LlmError::Network(e)), state));
                }
                None => {
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                    state.exhausted = true;
                }
            }
        }
    })
    .boxed()
}
