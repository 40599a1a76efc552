//! Incremental UTF-8 repair for remote output.
//!
//! The shell's output arrives in arbitrary chunks that can split a multi-byte
//! character anywhere, but the client-facing stream carries text frames that
//! must each be valid UTF-8 on their own.

/// Stitches a chunked byte stream back into whole UTF-8 frames.
///
/// An incomplete sequence at the end of a chunk (at most three bytes) is held
/// back until its continuation arrives. Bytes that can never form a valid
/// sequence become U+FFFD instead of being dropped, so output length stays
/// honest even through binary noise.
#[derive(Debug, Default)]
pub struct Utf8Stitcher {
    tail: Vec<u8>,
}

impl Utf8Stitcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one chunk and return every character that is now complete.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.tail);
        data.extend_from_slice(chunk);

        let mut out = String::with_capacity(data.len());
        let mut rest = data.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // valid_up_to guarantees this slice is well-formed.
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            // Sequence runs past the chunk; wait for more.
                            self.tail = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Drain the buffer at end of stream. A sequence that never completed is
    /// rendered with replacement characters rather than lost.
    pub fn flush(&mut self) -> String {
        if self.tail.is_empty() {
            return String::new();
        }
        let tail = std::mem::take(&mut self.tail);
        String::from_utf8_lossy(&tail).into_owned()
    }

    /// Bytes currently held back waiting for a continuation.
    pub fn pending(&self) -> usize {
        self.tail.len()
    }
}

#[cfg(test)]
#[path = "utf8_tests.rs"]
mod utf8_tests;
