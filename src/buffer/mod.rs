//! Buffer management for console output

mod ansi;

pub use ansi::AnsiFilter;

use bytes::BytesMut;

/// Ratio for buffer compaction strategy.
/// When buffer is full, discard oldest 1/3 and keep newest 2/3.
const DISCARD_RATIO: usize = 3;

/// Default number of transcript bytes retained for diagnostics.
pub const DEFAULT_TRANSCRIPT_LIMIT: usize = 64 * 1024;

/// Manages buffering of console output with intelligent compaction
pub struct BufferManager {
    buffer: BytesMut,
    matched_position: usize,
    max_size: usize,
    ansi: Option<AnsiFilter>,
}

impl BufferManager {
    /// Create a new buffer manager
    pub fn new(max_size: usize, strip_ansi: bool) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_size),
            matched_position: 0,
            max_size,
            ansi: strip_ansi.then(AnsiFilter::new),
        }
    }

    /// Append data to the buffer, returning the bytes actually stored
    pub fn append(&mut self, data: &[u8]) -> Vec<u8> {
        let data_to_append = match self.ansi.as_mut() {
            Some(filter) => filter.feed(data),
            None => data.to_vec(),
        };

        if self.buffer.len() + data_to_append.len() > self.max_size {
            self.compact();
        }

        self.buffer.extend_from_slice(&data_to_append);
        data_to_append
    }

    /// Get the buffer as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Get unmatched portion of the buffer
    pub fn unmatched(&self) -> &[u8] {
        &self.buffer[self.matched_position..]
    }

    /// Mark a position as matched
    pub fn mark_matched(&mut self, end_position: usize) {
        self.matched_position = end_position.min(self.buffer.len());
    }

    /// Get the current buffer length
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer holds no data
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the matched position
    pub fn matched_position(&self) -> usize {
        self.matched_position
    }

    /// Unmatched text between the last match and `position`
    pub fn before(&self, position: usize) -> &[u8] {
        let end = position.min(self.buffer.len());
        &self.buffer[self.matched_position.min(end)..end]
    }

    /// Drop everything buffered so far.
    ///
    /// Used when a batch fails so a later attempt starts from fresh output.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.matched_position = 0;
    }

    /// Compact the buffer using 2/3 discard strategy
    fn compact(&mut self) {
        // Discard the oldest third, but never unmatched data if matched data
        // alone covers more than that
        let discard_amount = self.max_size / DISCARD_RATIO;
        let keep_from = discard_amount.max(self.matched_position);

        if keep_from > 0 && keep_from < self.buffer.len() {
            let _ = self.buffer.split_to(keep_from);
            self.matched_position = self.matched_position.saturating_sub(keep_from);
        } else if keep_from >= self.buffer.len() {
            self.clear();
        }
    }
}

/// Bounded record of everything a session has seen, kept for diagnostics.
///
/// Only the most recent `limit` bytes survive; older text is dropped from the
/// front on a character boundary.
#[derive(Debug, Clone)]
pub struct Transcript {
    text: String,
    limit: usize,
}

impl Transcript {
    /// Create an empty transcript retaining at most `limit` bytes
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
        }
    }

    /// Record raw output (lossy UTF-8)
    pub fn record(&mut self, data: &[u8]) {
        self.text.push_str(&String::from_utf8_lossy(data));

        if self.text.len() > self.limit {
            let mut cut = self.text.len() - self.limit;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
        }
    }

    /// The retained text
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSCRIPT_LIMIT)
    }
}
