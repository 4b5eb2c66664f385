//! Consistent Overhead Byte Stuffing.
//!
//! Removes every zero byte from a payload so that a single `0x00` can delimit
//! frames on the wire. A payload of up to 254 bytes becomes at most 255
//! stuffed bytes plus the trailing delimiter.
//!
//! [`CobsBuffer`] keeps its state between calls. The receive side can feed it
//! arbitrary fragments of the byte stream and a frame completes only when its
//! delimiter arrives, no matter how the transport chunked the bytes.

use crate::constants::{DELIMITER, MAX_CONTENT, MAX_ENCODED};
use crate::error::CobsError;
use tracing::trace;

/// Working buffer of the codec.
///
/// One instance encodes, another decodes; they are never shared. After
/// [`encode`](Self::encode) the buffer holds the stuffed bytes, after a
/// completed [`decode`](Self::decode) it holds the recovered content.
#[derive(Clone)]
pub struct CobsBuffer {
    // Encoded length while encoding, decoded length while decoding
    length: usize,
    // Bytes left until the next stuffed zero
    counter: u8,
    data: [u8; MAX_ENCODED],
}

impl CobsBuffer {
    pub fn new() -> Self {
        Self {
            length: 0,
            counter: 0,
            data: [0; MAX_ENCODED],
        }
    }

    /// Forget any partial frame.
    pub fn reset(&mut self) {
        self.length = 0;
        self.counter = 0;
    }

    /// Number of content bytes decoded so far, or the encoded length
    /// (without delimiter) after an encode.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// True once the decoder has seen the leading run marker of a frame.
    pub fn in_frame(&self) -> bool {
        self.counter != 0
    }

    /// Decoded content. Only meaningful after `decode` reported a complete frame.
    pub fn content(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Stuffed bytes including the trailing delimiter. Only meaningful after a
    /// successful `encode`.
    pub fn encoded(&self) -> &[u8] {
        &self.data[..self.length + 1]
    }

    /// Encode `content` into this buffer.
    ///
    /// Returns the encoded length excluding the delimiter; the caller sends
    /// that many bytes plus one (see [`encoded`](Self::encoded)).
    pub fn encode(&mut self, content: &[u8]) -> Result<usize, CobsError> {
        self.reset();
        if content.len() > MAX_CONTENT {
            return Err(CobsError::Overflow);
        }

        for &byte in content {
            self.length += 1;
            self.counter += 1;
            if byte == 0 {
                // Back-fill the marker that opened this run; the slot of the
                // zero itself becomes the next marker.
                self.data[self.length - self.counter as usize] = self.counter;
                self.counter = 0;
            } else {
                self.data[self.length] = byte;
            }
        }

        // Final run marker, then the delimiter
        self.data[self.length - self.counter as usize] = self.counter + 1;
        self.length += 1;
        self.data[self.length] = DELIMITER;

        trace!(content = content.len(), encoded = self.length, "cobs encode");
        Ok(self.length)
    }

    /// Feed the next chunk of the stuffed stream.
    ///
    /// * `Ok(Some(n))`: frame complete, `n` bytes of `input` consumed
    ///   including the delimiter. The content is ready in [`content`](Self::content).
    /// * `Ok(None)`: no delimiter yet, every byte of `input` has been absorbed.
    /// * `Err(_)`: the stream is malformed; reset before reuse.
    pub fn decode(&mut self, input: &[u8]) -> Result<Option<usize>, CobsError> {
        for (i, &byte) in input.iter().enumerate() {
            if byte == DELIMITER {
                match self.counter {
                    // Redundant delimiter between frames
                    0 => continue,
                    1 => {
                        trace!(content = self.length, consumed = i + 1, "cobs frame complete");
                        return Ok(Some(i + 1));
                    }
                    _ => return Err(CobsError::UnexpectedZero),
                }
            }

            // Leading run marker of a new frame
            if self.length == 0 && self.counter == 0 {
                self.counter = byte;
                continue;
            }

            if self.counter == 0 {
                return Err(CobsError::MissingMarker);
            }
            if self.length >= MAX_CONTENT {
                return Err(CobsError::Overflow);
            }

            if self.counter == 1 {
                // Run ended with a stuffed zero; this byte is the next marker
                self.data[self.length] = 0;
                self.counter = byte;
            } else {
                self.data[self.length] = byte;
                self.counter -= 1;
            }
            self.length += 1;
        }
        Ok(None)
    }
}

impl Default for CobsBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CobsBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CobsBuffer")
            .field("length", &self.length)
            .field("counter", &self.counter)
            .field("data", &hex::encode(&self.data[..self.length]))
            .finish()
    }
}

/// Encode `content` into a fresh vector, delimiter included.
pub fn encode_to_vec(content: &[u8]) -> Result<Vec<u8>, CobsError> {
    let mut buf = CobsBuffer::new();
    buf.encode(content)?;
    Ok(buf.encoded().to_vec())
}
