//! Transport-neutral built-in framers and filters
//!
//! Protocol-family framers (SBP, NMEA, and friends) live in their own
//! crate; the fabric itself ships only the two generic framings every
//! daemon needs, plus the no-op filter.

use bytes::Bytes;
use loran_core::{FrameFilter, Framer, FramerStep};

/// Longest length-delimited message accepted before the framer assumes
/// it is looking at a corrupt length prefix.
const MAX_DELIMITED_LEN: usize = 1 << 20;

/// Passthrough framer: every received chunk is one frame.
///
/// Used for ports whose transport already preserves boundaries, or
/// when the consumer wants the raw byte stream untouched.
#[derive(Debug, Default)]
pub struct BytesFramer;

impl BytesFramer {
    /// Create a passthrough framer.
    pub fn new() -> Self {
        Self
    }
}

impl Framer for BytesFramer {
    fn protocol(&self) -> &'static str {
        "bytes"
    }

    fn step(&mut self, input: &[u8]) -> FramerStep {
        if input.is_empty() {
            return FramerStep::consumed(0);
        }
        FramerStep::emit(input.len(), Bytes::copy_from_slice(input))
    }

    fn reset(&mut self) {}
}

enum VarintRead {
    Complete { value: u64, width: usize },
    Partial,
    Malformed,
}

/// Decode a base-128 varint from the front of `buf`. Length prefixes
/// never need more than 5 bytes (32-bit lengths), so a longer run of
/// continuation bits is malformed.
fn decode_varint(buf: &[u8]) -> VarintRead {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate().take(5) {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return VarintRead::Complete { value, width: i + 1 };
        }
    }
    if buf.len() < 5 {
        VarintRead::Partial
    } else {
        VarintRead::Malformed
    }
}

/// Varint-length-delimited framer, as used for protobuf message
/// streams. The emitted frame is the message body without its length
/// prefix.
///
/// Delimited framing has no sync marker, so a malformed or implausibly
/// large length prefix cannot be recovered from mid-buffer. The framer
/// flushes its accumulator instead and re-locks on the next chunk,
/// trading the corrupted chunk for a port that never wedges.
#[derive(Debug, Default)]
pub struct DelimitedFramer {
    buf: Vec<u8>,
}

impl DelimitedFramer {
    /// Create an empty length-delimited framer.
    pub fn new() -> Self {
        Self::default()
    }

    fn drain_buffer(&mut self) -> Option<Bytes> {
        match decode_varint(&self.buf) {
            VarintRead::Complete { value, width } => {
                let len = value as usize;
                if len > MAX_DELIMITED_LEN {
                    self.buf.clear();
                    return None;
                }
                let total = width + len;
                if self.buf.len() < total {
                    return None;
                }
                let rest = self.buf.split_off(total);
                let mut whole = std::mem::replace(&mut self.buf, rest);
                let payload = whole.split_off(width);
                Some(Bytes::from(payload))
            }
            VarintRead::Partial => None,
            VarintRead::Malformed => {
                self.buf.clear();
                None
            }
        }
    }
}

impl Framer for DelimitedFramer {
    fn protocol(&self) -> &'static str {
        "protobuf"
    }

    fn step(&mut self, input: &[u8]) -> FramerStep {
        self.buf.extend_from_slice(input);
        let frame = self.drain_buffer();
        FramerStep {
            consumed: input.len(),
            frame,
        }
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}

/// Filter that keeps everything. Registered as `"none"` so adapter
/// options always have a valid filter name to fall back on.
#[derive(Debug, Default)]
pub struct AllowAllFilter;

impl AllowAllFilter {
    /// Create the no-op filter.
    pub fn new() -> Self {
        Self
    }
}

impl FrameFilter for AllowAllFilter {
    fn name(&self) -> &'static str {
        "none"
    }

    fn allow(&mut self, _frame: &[u8]) -> bool {
        true
    }
}

// ==========================================================================
// Tests
// ==========================================================================
