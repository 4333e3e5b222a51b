//! Server-sent events decoding for chat-completion streams.
//!
//! Network chunks do not line up with event boundaries, so the decoder
//! buffers raw bytes and only yields complete `data:` lines.

use anyhow::{anyhow, Result};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use super::TextStream;

/// One decoded `data:` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    Data(String),
    Done,
}

/// Incremental line decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning the frames it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        if self.done {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();

            if data.trim() == "[DONE]" {
                self.done = true;
                self.buffer.clear();
                frames.push(SseFrame::Done);
                break;
            }
            frames.push(SseFrame::Data(data.to_string()));
        }
        frames
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamFailure {
    error: StreamFailureBody,
}

#[derive(Debug, Deserialize)]
struct StreamFailureBody {
    message: String,
}

/// Content delta carried by one frame, if any
pub fn frame_content(frame: &SseFrame) -> Option<Result<String>> {
    let SseFrame::Data(data) = frame else {
        return None;
    };

    if let Ok(failure) = serde_json::from_str::<StreamFailure>(data) {
        return Some(Err(anyhow!("Provider reported an error mid-stream: {}", failure.error.message)));
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(Ok),
        Err(e) => {
            debug!(error = %e, "Skipping undecodable stream frame");
            None
        }
    }
}

/// Turn a raw byte stream into a stream of content deltas
pub fn content_deltas<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut decoder = SseDecoder::new();

    let deltas = bytes
        .map(move |chunk| match chunk {
            Ok(bytes) => decoder
                .push(bytes.as_ref())
                .iter()
                .filter_map(frame_content)
                .collect::<Vec<_>>(),
            Err(e) => vec![Err(anyhow!("Stream error: {}", e))],
        })
        .flat_map(stream::iter);

    Box::pin(deltas)
}
