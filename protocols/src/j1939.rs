//! J1939 capture record framer
//!
//! CAN capture hardware emits fixed 13-byte records:
//!
//! ```text
//! can id u32 BE | dlc u8 | data[8]
//! ```
//!
//! The id is a 29-bit extended identifier, so its top three bits are
//! always zero, and a J1939 DLC never exceeds 8. Those two facts are
//! the only sync check available; an implausible header slides the
//! scan forward one byte.

use bytes::Bytes;
use loran_core::{Framer, FramerStep};

const RECORD_LEN: usize = 13;

/// Id high byte plus DLC, the smallest prefix that can be validated.
const CHECK_LEN: usize = 5;

/// Framer for fixed-width J1939 capture records.
#[derive(Debug, Default)]
pub struct J1939Framer {
    buf: Vec<u8>,
}

impl J1939Framer {
    /// Create a framer seeking its first plausible record.
    pub fn new() -> Self {
        Self::default()
    }

    fn extract(&mut self) -> Option<Bytes> {
        loop {
            match self.buf.first() {
                None => return None,
                Some(&b) if b & 0xE0 != 0 => {
                    self.buf.drain(..1);
                    continue;
                }
                Some(_) => {}
            }
            if self.buf.len() < CHECK_LEN {
                return None;
            }
            if self.buf[4] > 8 {
                self.buf.drain(..1);
                continue;
            }
            if self.buf.len() < RECORD_LEN {
                return None;
            }
            let rest = self.buf.split_off(RECORD_LEN);
            let record = std::mem::replace(&mut self.buf, rest);
            return Some(Bytes::from(record));
        }
    }
}

impl Framer for J1939Framer {
    fn protocol(&self) -> &'static str {
        "j1939"
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
