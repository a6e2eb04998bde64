//! Line framing for streamed HTTP bodies (NDJSON and server-sent events)

use futures::{Stream, StreamExt};

use crate::error::{Error, Result};

/// Reassembles complete lines from arbitrarily split byte chunks
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every complete line (without the terminator)
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Remaining bytes once the body has ended, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).trim_end_matches('\r').to_string();
        self.pending.clear();
        Some(rest)
    }
}

/// Turn a streaming response body into a stream of lines
pub fn body_lines(response: reqwest::Response) -> impl Stream<Item = Result<String>> + Send {
    async_stream::try_stream! {
        let mut body = response.bytes_stream();
        let mut buffer = LineBuffer::new();

        while let Some(chunk) = body.next().await {
            let bytes = chunk.map_err(|e| Error::upstream(format!("Stream error: {}", e)))?;
            for line in buffer.push(&bytes) {
                yield line;
            }
        }

        if let Some(rest) = buffer.finish() {
            yield rest;
        }
    }
}
