//! Minimal server-sent-events decoder for streamed model responses.
//!
//! Network chunks can split a line, or a multi-byte character, anywhere. Bytes
//! are buffered until a full line is available and events are yielded in the
//! order they complete.

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the `data` payloads of every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a trailing event that was not terminated by a blank line.
    pub fn finish(mut self) -> Option<String> {
        if !self.buf.is_empty() {
            let line = std::mem::take(&mut self.buf);
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(|c| c == '\n' || c == '\r');

        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(rest) = line.strip_prefix("data:") {
            self.data
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
        // Comments, `event:`, `id:` and `retry:` lines carry nothing we use.
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_events_in_order() {
        let mut d = SseDecoder::new();
        let events = d.push(b"data: {\"n\":1}\r\n\r\ndata: {\"n\":2}\r\n\r\n");
        assert_eq!(events, vec!["{\"n\":1}", "{\"n\":2}"]);
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn buffers_across_chunk_boundaries() {
        let payload = "data: {\"text\":\"₹ 1,234\"}\n\ndata: {\"text\":\"tail\"}\n\n";
        let bytes = payload.as_bytes();
        let mut d = SseDecoder::new();
        let mut events = Vec::new();
        // One byte at a time splits the multi-byte rupee sign too.
        for b in bytes {
            events.extend(d.push(std::slice::from_ref(b)));
        }
        assert_eq!(events, vec!["{\"text\":\"₹ 1,234\"}", "{\"text\":\"tail\"}"]);
    }

    #[test]
    fn joins_multi_line_data() {
        let mut d = SseDecoder::new();
        let events = d.push(b"data: a\ndata: b\n\n");
        assert_eq!(events, vec!["a\nb"]);
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        let mut d = SseDecoder::new();
        let events = d.push(b": keep-alive\nevent: message\ndata: x\n\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: last").is_empty());
        assert_eq!(d.finish(), Some("last".to_string()));
    }
}
