//! NMEA 0183 sentence framer
//!
//! Sentences open with `$` (talker) or `!` (encapsulation, e.g. AIS),
//! carry a printable-ASCII body with an optional `*hh` XOR checksum,
//! and terminate with CRLF. The standard caps a sentence at 82 bytes
//! including the start character and the terminator; anything longer
//! is treated as line noise.
//!
//! A malformed or checksum-failing sentence costs exactly its start
//! character: the scan resumes at the next `$`/`!` inside the buffer.

use bytes::Bytes;
use loran_core::{Framer, FramerStep};
use tracing::trace;

const MAX_SENTENCE: usize = 82;

fn is_start(b: u8) -> bool {
    b == b'$' || b == b'!'
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

enum Scan {
    /// Sentence ends at this exclusive offset.
    Complete(usize),
    Incomplete,
    Malformed,
}

/// Framer for NMEA 0183 sentence streams.
///
/// Emits whole sentences, start character through CRLF.
#[derive(Debug, Default)]
pub struct NmeaFramer {
    buf: Vec<u8>,
}

impl NmeaFramer {
    /// Create a framer seeking its first start character.
    pub fn new() -> Self {
        Self::default()
    }

    fn extract(&mut self) -> Option<Bytes> {
        loop {
            match self.buf.iter().position(|&b| is_start(b)) {
                Some(0) => {}
                Some(at) => {
                    self.buf.drain(..at);
                }
                None => {
                    self.buf.clear();
                    return None;
                }
            }
            match self.scan_sentence() {
                Scan::Complete(end) => {
                    let rest = self.buf.split_off(end);
                    let sentence = std::mem::replace(&mut self.buf, rest);
                    return Some(Bytes::from(sentence));
                }
                Scan::Incomplete => return None,
                Scan::Malformed => {
                    trace!("malformed NMEA sentence, resyncing");
                    self.buf.drain(..1);
                }
            }
        }
    }

    /// Walk the buffer from just after the start character to the
    /// terminator, checking body bytes along the way.
    fn scan_sentence(&self) -> Scan {
        for (i, &b) in self.buf.iter().enumerate().skip(1) {
            match b {
                b'\r' => {
                    if i + 2 > MAX_SENTENCE {
                        return Scan::Malformed;
                    }
                    return match self.buf.get(i + 1) {
                        None => Scan::Incomplete,
                        Some(&b'\n') => self.validate(i),
                        Some(_) => Scan::Malformed,
                    };
                }
                _ if is_printable(b) => {}
                _ => return Scan::Malformed,
            }
        }
        if self.buf.len() >= MAX_SENTENCE {
            Scan::Malformed
        } else {
            Scan::Incomplete
        }
    }

    /// Apply the checksum, if the sentence carries one. `cr` is the
    /// index of the terminating carriage return.
    fn validate(&self, cr: usize) -> Scan {
        let body = &self.buf[1..cr];
        if body.len() >= 3 && body[body.len() - 3] == b'*' {
            let (data, tail) = body.split_at(body.len() - 3);
            let (high, low) = match (hex_value(tail[1]), hex_value(tail[2])) {
                (Some(high), Some(low)) => (high, low),
                _ => return Scan::Malformed,
            };
            let wire = (high << 4) | low;
            let computed = data.iter().fold(0u8, |acc, &b| acc ^ b);
            if computed != wire {
                trace!(wire, computed, "NMEA checksum mismatch");
                return Scan::Malformed;
            }
        } else if body.contains(&b'*') {
            // `*` is reserved for the checksum delimiter; anywhere
            // else it cannot be part of a well-formed sentence.
            return Scan::Malformed;
        }
        Scan::Complete(cr + 2)
    }
}

impl Framer for NmeaFramer {
    fn protocol(&self) -> &'static str {
        "nmea"
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
