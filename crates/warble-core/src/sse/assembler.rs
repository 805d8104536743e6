//! Incremental byte-to-line reassembly for upstream event streams.

/// Turns arbitrarily chunked response bytes into complete text lines.
///
/// Network reads can split an event line, or even a single UTF-8 character,
/// at any byte offset. The assembler carries both remainders across `feed`
/// calls: the undecoded tail of an incomplete multi-byte sequence, and the
/// decoded text after the last newline. Feeding the same bytes in different
/// chunkings yields the same lines.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    /// Trailing bytes of a multi-byte sequence the last chunk cut short.
    pending: Vec<u8>,
    /// Decoded text after the last observed newline.
    remainder: String,
    /// Bytes discarded because they never formed a valid character.
    dropped_bytes: u64,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk and return every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);
        self.decode(&bytes);
        self.take_lines()
    }

    /// Hand back the unterminated final line, if any.
    ///
    /// Called at end of stream. The returned text lacks its terminator but
    /// is still eligible for parsing. An incomplete multi-byte sequence
    /// still pending at this point can never become a character and is
    /// dropped rather than decoded lossily.
    pub fn flush(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            self.dropped_bytes += self.pending.len() as u64;
            self.pending.clear();
        }
        if self.remainder.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.remainder))
        }
    }

    /// Bytes dropped so far (invalid sequences, truncated tail).
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// Incremental UTF-8 decode: the valid prefix goes to the remainder, an
    /// incomplete tail is carried to the next `feed`, and invalid sequences
    /// decode to U+FFFD.
    fn decode(&mut self, mut bytes: &[u8]) {
        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.remainder.push_str(text);
                    return;
                }
                Err(err) => {
                    if let Ok(valid) = std::str::from_utf8(&bytes[..err.valid_up_to()]) {
                        self.remainder.push_str(valid);
                    }
                    bytes = &bytes[err.valid_up_to()..];
                    match err.error_len() {
                        // Sequence runs past the end of the chunk.
                        None => {
                            self.pending = bytes.to_vec();
                            return;
                        }
                        // Sequence is invalid outright.
                        Some(len) => {
                            self.remainder.push('\u{FFFD}');
                            self.dropped_bytes += len as u64;
                            bytes = &bytes[len..];
                        }
                    }
                }
            }
        }
    }

    /// Split off every complete line, leaving the tail as the remainder.
    fn take_lines(&mut self) -> Vec<String> {
        let Some(last_newline) = self.remainder.rfind('\n') else {
            return Vec::new();
        };
        let tail = self.remainder.split_off(last_newline + 1);
        let head = std::mem::replace(&mut self.remainder, tail);
        head[..head.len() - 1]
            .split('\n')
            .map(str::to_owned)
            .collect()
    }
}
