//! Minimal server-sent-events decoder for streamed chat completions.
//!
//! Only `data:` fields matter to the provider stream; comments, `event:` and
//! `id:` lines are dropped. Bytes are buffered until a full line arrives, so
//! multi-byte characters split across network chunks decode correctly.

/// Sentinel payload closing an OpenAI-style stream.
pub const DONE: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feeds a chunk and returns the `data:` payloads of every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_data_line(&String::from_utf8_lossy(&line)) {
                payloads.push(data);
            }
        }
        payloads
    }
}

fn parse_data_line(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\n', '\r']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        return None;
    }
    Some(data.to_string())
}
