//! Advanced Navigation packet framer
//!
//! Packets have no preamble. The 5-byte header is its own sync check:
//!
//! ```text
//! lrc u8 | packet id u8 | payload len u8 | payload crc u16 LE
//! ```
//!
//! where `lrc = ((id + len + crc_lo + crc_hi) ^ 0xFF) + 1` in wrapping
//! byte arithmetic, and the CRC is CRC-16/CCITT seeded with 0xFFFF over
//! the payload. Sync is recovered by sliding one byte at a time until a
//! header LRC matches and the payload CRC confirms it.

use crate::crc::crc16_ccitt;
use bytes::Bytes;
use loran_core::{Framer, FramerStep};
use tracing::trace;

const HEADER_LEN: usize = 5;

fn header_lrc(id: u8, len: u8, crc: u16) -> u8 {
    let [crc_lo, crc_hi] = crc.to_le_bytes();
    (id.wrapping_add(len)
        .wrapping_add(crc_lo)
        .wrapping_add(crc_hi)
        ^ 0xFF)
        .wrapping_add(1)
}

/// Framer for the ANPP stream spoken by Advanced Navigation IMUs.
///
/// Emits header plus payload so consumers keep the packet id and can
/// forward the packet untouched.
#[derive(Debug, Default)]
pub struct AnppFramer {
    buf: Vec<u8>,
}

impl AnppFramer {
    /// Create a framer seeking its first valid header.
    pub fn new() -> Self {
        Self::default()
    }

    fn extract(&mut self) -> Option<Bytes> {
        while self.buf.len() >= HEADER_LEN {
            let id = self.buf[1];
            let len = self.buf[2];
            let crc = u16::from_le_bytes([self.buf[3], self.buf[4]]);
            if self.buf[0] != header_lrc(id, len, crc) {
                self.buf.drain(..1);
                continue;
            }
            let total = HEADER_LEN + usize::from(len);
            if self.buf.len() < total {
                // Candidate header, payload still in flight. If the
                // header was a fluke the CRC rejects it later.
                return None;
            }
            if crc16_ccitt(0xFFFF, &self.buf[HEADER_LEN..total]) != crc {
                trace!(id, "ANPP payload CRC mismatch, resyncing");
                self.buf.drain(..1);
                continue;
            }
            let rest = self.buf.split_off(total);
            let packet = std::mem::replace(&mut self.buf, rest);
            return Some(Bytes::from(packet));
        }
        None
    }
}

impl Framer for AnppFramer {
    fn protocol(&self) -> &'static str {
        "anpp"
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
