use crate::errors::ChatError;
use crate::protocol::StreamEvent;

const FRAME_DELIMITER: &[u8] = b"\n\n";
const DATA_PREFIX: &str = "data: ";

/// Incremental decoder for the `data: <json>\n\n` response stream.
///
/// Bytes are buffered until a full frame is available, so frames split across
/// network reads (including inside a multi-byte character) decode intact.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known not to start a delimiter.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the events of every frame it completed, in
    /// arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>, ChatError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.next_delimiter() {
            let frame: Vec<u8> = self.buffer.drain(..end + FRAME_DELIMITER.len()).collect();
            self.scanned = 0;
            if let Some(event) = decode_frame(&frame[..end])? {
                events.push(event);
            }
        }
        // The tail may hold the first half of a delimiter.
        self.scanned = self.buffer.len().saturating_sub(FRAME_DELIMITER.len() - 1);
        Ok(events)
    }

    /// Decodes whatever is left once the body has ended. A final frame
    /// without its blank-line terminator is still honoured.
    pub fn finish(&mut self) -> Result<Option<StreamEvent>, ChatError> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        decode_frame(&rest)
    }

    fn next_delimiter(&self) -> Option<usize> {
        self.buffer[self.scanned..]
            .windows(FRAME_DELIMITER.len())
            .position(|window| window == FRAME_DELIMITER)
            .map(|offset| self.scanned + offset)
    }
}

/// `Ok(None)` for records that are not data frames (keep-alives, comments,
/// stray blank lines).
fn decode_frame(frame: &[u8]) -> Result<Option<StreamEvent>, ChatError> {
    let text = std::str::from_utf8(frame)
        .map_err(|e| ChatError::malformed(format!("invalid UTF-8: {e}")))?;
    let text = text.trim_start_matches('\n');

    let Some(payload) = text.strip_prefix(DATA_PREFIX) else {
        if !text.trim().is_empty() {
            tracing::debug!("Skipping non-data record: {text:?}");
        }
        return Ok(None);
    };

    serde_json::from_str(payload)
        .map(Some)
        .map_err(|e| ChatError::malformed(format!("{e} in {payload:?}")))
}
