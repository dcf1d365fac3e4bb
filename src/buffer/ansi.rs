//! ANSI escape sequence stripping

/// Where the filter is inside an escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Escape,
    Csi,
    Osc,
    OscEscape,
    Charset,
}

/// Streaming ANSI escape sequence remover.
///
/// Serial consoles deliver output in arbitrary chunks, so an escape sequence
/// may be split across two reads. The filter keeps its position between calls
/// to [`AnsiFilter::feed`] instead of treating every chunk independently.
/// Sequences are removed, never interpreted.
#[derive(Debug, Clone)]
pub struct AnsiFilter {
    state: State,
}

impl AnsiFilter {
    /// Create a filter positioned in plain text
    pub fn new() -> Self {
        Self { state: State::Text }
    }

    /// Filter one chunk, returning the bytes outside escape sequences
    pub fn feed(&mut self, data: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(data.len());

        for &byte in data {
            self.state = match (self.state, byte) {
                (State::Text, b'\x1b') => State::Escape,
                (State::Text, _) => {
                    result.push(byte);
                    State::Text
                }
                // CSI (Control Sequence Introducer): ends on a final byte
                (State::Escape, b'[') => State::Csi,
                // OSC (Operating System Command): ends on BEL or ST
                (State::Escape, b']') => State::Osc,
                // Character set selection (ESC ( X or ESC ) X)
                (State::Escape, b'(' | b')') => State::Charset,
                (State::Escape, _) => State::Text,
                (State::Csi, 0x40..=0x7e) => State::Text,
                (State::Csi, _) => State::Csi,
                (State::Osc, b'\x07') => State::Text,
                (State::Osc, b'\x1b') => State::OscEscape,
                (State::Osc, _) => State::Osc,
                (State::OscEscape, b'\\') => State::Text,
                (State::OscEscape, _) => State::Osc,
                (State::Charset, _) => State::Text,
            };
        }

        result
    }
}

impl Default for AnsiFilter {
    fn default() -> Self {
        Self::new()
    }
}
