//! Incremental server-sent events parser for streamed completions

/// One `data:` payload from the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    /// JSON (or other) payload text
    Payload(String),
    /// The `[DONE]` terminator
    Done,
}

/// Splits arbitrary byte chunks into complete SSE `data:` lines
///
/// Bytes are buffered until a newline arrives, so multi-byte characters split
/// across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseLineParser {
    buffer: Vec<u8>,
}

impl SseLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every payload completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_line(&line) {
                out.push(data);
            }
        }
        out
    }

    /// Parse whatever is left once the byte stream ends
    pub fn flush(&mut self) -> Option<SseData> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseData> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches(['\n', '\r']);
    let data = line.strip_prefix("data:")?.trim_start();

    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseData::Done);
    }
    Some(SseData::Payload(data.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut parser = SseLineParser::new();

        assert!(parser.push(b"data: {\"a\"").is_empty());
        let events = parser.push(b":1}\n\ndata: [DONE]\n");

        assert_eq!(
            events,
            vec![SseData::Payload("{\"a\":1}".to_string()), SseData::Done]
        );
    }

    #[test]
    fn test_ignores_comments_and_other_fields() {
        let mut parser = SseLineParser::new();
        let events = parser.push(b": keep-alive\nevent: message\r\ndata: x\r\n");
        assert_eq!(events, vec![SseData::Payload("x".to_string())]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut parser = SseLineParser::new();
        let bytes = "data: é\n".as_bytes();
        let (head, tail) = bytes.split_at(7);

        assert!(parser.push(head).is_empty());
        assert_eq!(parser.push(tail), vec![SseData::Payload("é".to_string())]);
    }

    #[test]
    fn test_flush_returns_unterminated_line() {
        let mut parser = SseLineParser::new();
        assert!(parser.push(b"data: tail").is_empty());
        assert_eq!(parser.flush(), Some(SseData::Payload("tail".to_string())));
        assert_eq!(parser.flush(), None);
    }
}
