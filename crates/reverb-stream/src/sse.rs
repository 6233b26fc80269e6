use reverb_core::ReverbError;

/// A decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// The `data:` payload; multi-line data joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// The stream-terminating sentinel the provider sends after the last
    /// chunk.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Buffered, incremental SSE decoder.
///
/// Events are separated by `\n\n`, `\r\r`, or `\r\n\r\n`. Lines starting
/// with `:` are comments. `event:` and `data:` fields are recognized, with
/// a single leading space after the colon stripped; multi-line `data:`
/// fields are concatenated with `\n`. Incomplete events stay buffered
/// until the next `feed`.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed raw bytes and extract the complete events they finish.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some((end, delim_len)) = find_event_boundary(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + delim_len).collect();
            let text = String::from_utf8_lossy(&raw[..end]);
            if let Some(event) = parse_event(&text) {
                events.push(event);
            }
        }
        events
    }

    /// Whether un-terminated bytes remain buffered.
    pub fn has_remaining(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Find the earliest event delimiter. Returns (offset, delimiter length).
/// `\r\n\r\n` is checked first so it is not misread as two bare returns.
fn find_event_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len() {
        let rest = &buf[i..];
        if rest.starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
        if rest.starts_with(b"\n\n") {
            return Some((i, 2));
        }
        if rest.starts_with(b"\r\r") {
            return Some((i, 2));
        }
    }
    None
}

fn parse_event(text: &str) -> Option<SseEvent> {
    let mut event_type: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in split_lines(text) {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(strip_leading_space(value).to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(strip_leading_space(value));
        }
        // Other fields (id:, retry:, unknown) are ignored.
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event: event_type,
        data: data_lines.join("\n"),
    })
}

/// Exactly one leading space after the colon is stripped; further
/// whitespace is payload.
fn strip_leading_space(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}

/// Split on `\n`, `\r`, or `\r\n` line terminators.
fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += 1;
                if i < bytes.len() && bytes[i] == b'\n' {
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Extract the completion text from a captured SSE body: the ordered
/// concatenation of `choices[0].delta.content` across chunks, up to and
/// excluding `[DONE]`.
///
/// Chunks without a content field (heartbeats, role chunks) contribute
/// nothing. A `finish_reason` of `"stop"` marks the logical end even when
/// `[DONE]` never arrives. Malformed JSON in any data frame aborts the
/// whole extraction.
pub fn extract_content(raw: &[u8]) -> Result<String, ReverbError> {
    let mut parser = SseParser::new();
    let mut text = String::new();

    for event in parser.feed(raw) {
        if event.is_done() {
            break;
        }

        let value: serde_json::Value = serde_json::from_str(&event.data)
            .map_err(|e| ReverbError::Parse(format!("malformed chunk JSON: {e}")))?;

        if let Some(content) = value["choices"][0]["delta"]["content"].as_str() {
            text.push_str(content);
        }

        if value["choices"][0]["finish_reason"].as_str() == Some("stop") {
            break;
        }
    }

    Ok(text)
}
