//! Swift Binary Protocol framer
//!
//! Wire layout:
//!
//! ```text
//! 0x55 | msg type u16 LE | sender u16 LE | len u8 | payload | crc u16 LE
//! ```
//!
//! The CRC is CRC-16/CCITT seeded with zero, computed over everything
//! between the preamble and the CRC itself. A failed CRC discards only
//! the preamble byte, so a frame whose payload happens to contain 0x55
//! never drags the stream out of sync for more than one candidate.

use crate::crc::crc16_ccitt;
use bytes::Bytes;
use loran_core::{Framer, FramerStep};
use tracing::trace;

pub(crate) const PREAMBLE: u8 = 0x55;

/// Preamble, msg type, sender, and payload length.
const HEADER_LEN: usize = 6;
const CRC_LEN: usize = 2;

/// Framer for the SBP navigation stream.
///
/// Emits complete frames, preamble through CRC, so a consumer can
/// forward them verbatim or parse the header without re-framing.
#[derive(Debug, Default)]
pub struct SbpFramer {
    buf: Vec<u8>,
}

impl SbpFramer {
    /// Create a framer seeking its first preamble.
    pub fn new() -> Self {
        Self::default()
    }

    fn extract(&mut self) -> Option<Bytes> {
        loop {
            match self.buf.iter().position(|&b| b == PREAMBLE) {
                Some(0) => {}
                Some(at) => {
                    self.buf.drain(..at);
                }
                None => {
                    self.buf.clear();
                    return None;
                }
            }
            if self.buf.len() < HEADER_LEN {
                return None;
            }
            let total = HEADER_LEN + usize::from(self.buf[5]) + CRC_LEN;
            if self.buf.len() < total {
                return None;
            }
            let wire = u16::from_le_bytes([self.buf[total - 2], self.buf[total - 1]]);
            let computed = crc16_ccitt(0, &self.buf[1..total - CRC_LEN]);
            if computed == wire {
                let rest = self.buf.split_off(total);
                let frame = std::mem::replace(&mut self.buf, rest);
                return Some(Bytes::from(frame));
            }
            trace!(wire, computed, "SBP CRC mismatch, resyncing");
            self.buf.drain(..1);
        }
    }
}

impl Framer for SbpFramer {
    fn protocol(&self) -> &'static str {
        "sbp"
    }

    fn step(&mut self, input: &[u8]) -> FramerStep {
        self.buf.extend_from_slice(input);
        FramerStep {
            consumed: input.len(),
            frame: self.extract(),
        }
    }

    fn reset(&mut self) {
        self.buf.clear();
    }
}
