//! Line-based codec for tokio.
//!
//! Reads newline-terminated lines with a bounded buffer and writes
//! `ServerMessage`s verbatim.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::message::ServerMessage;

/// Input line bound, in bytes
pub const MAX_LINE_LENGTH: usize = 512;

/// Newline-delimited text codec.
///
/// A trailing `\r` is stripped and invalid UTF-8 is replaced. A line longer
/// than `max_len` is not an error: it is handed out in `max_len`-byte
/// chunks, each treated as a line of its own.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LENGTH)
    }

    /// Create a new codec with custom max line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len: max_len.max(1),
        }
    }

    fn to_text(raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        String::from_utf8_lossy(raw).into_owned()
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        // A newline (or CRLF) right after max_len bytes still ends a line
        // of max_len
        let window = if src.get(self.max_len) == Some(&b'\r') {
            self.max_len + 2
        } else {
            self.max_len + 1
        };
        let scan_end = src.len().min(window);

        if let Some(offset) = src[self.next_index.min(scan_end)..scan_end]
            .iter()
            .position(|b| *b == b'\n')
        {
            let end = self.next_index.min(scan_end) + offset;
            let line = src.split_to(end + 1);
            self.next_index = 0;
            return Ok(Some(Self::to_text(&line[..end])));
        }

        if src.len() >= window {
            let chunk = src.split_to(self.max_len);
            self.next_index = 0;
            return Ok(Some(Self::to_text(&chunk)));
        }

        // No complete line yet - remember where we stopped
        self.next_index = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if src.is_empty() {
            Ok(None)
        } else {
            let rest = src.split();
            Ok(Some(Self::to_text(&rest)))
        }
    }
}

impl Encoder<ServerMessage> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: ServerMessage, dst: &mut BytesMut) -> io::Result<()> {
        dst.extend_from_slice(msg.to_string().as_bytes());
        Ok(())
    }
}
