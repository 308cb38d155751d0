//! Coprocessor stats report framer
//!
//! The real-time core pushes periodic stats blobs over the rpmsg ring
//! with a light framing of its own:
//!
//! ```text
//! 0x7E 0x81 | payload len u16 LE | payload | xor u8
//! ```
//!
//! The trailing byte is the XOR of the payload. Ring buffers cap a
//! report well below a kilobyte, so a larger length field means the
//! sync pair was a coincidence inside other data.

use bytes::Bytes;
use loran_core::{Framer, FramerStep};
use tracing::trace;

const SYNC: [u8; 2] = [0x7E, 0x81];

/// Sync pair plus the length field.
const HEADER_LEN: usize = 4;
const MAX_PAYLOAD: usize = 1024;

fn xor_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, &b| acc ^ b)
}

/// Framer for rpmsg stats reports.
///
/// Emits the whole report, sync pair through checksum.
#[derive(Debug, Default)]
pub struct StatsFramer {
    buf: Vec<u8>,
}

impl StatsFramer {
    /// Create a framer seeking its first sync pair.
    pub fn new() -> Self {
        Self::default()
    }

    fn extract(&mut self) -> Option<Bytes> {
        loop {
            match self.buf.windows(2).position(|w| w == SYNC) {
                Some(0) => {}
                Some(at) => {
                    self.buf.drain(..at);
                }
                None => {
                    // A trailing 0x7E may pair with the first byte of
                    // the next chunk.
                    let keep = usize::from(self.buf.last() == Some(&SYNC[0]));
                    let garbage = self.buf.len() - keep;
                    self.buf.drain(..garbage);
                    return None;
                }
            }
            if self.buf.len() < HEADER_LEN {
                return None;
            }
            let len = usize::from(u16::from_le_bytes([self.buf[2], self.buf[3]]));
            if len > MAX_PAYLOAD {
                trace!(len, "stats length over cap, resyncing");
                self.buf.drain(..1);
                continue;
            }
            let total = HEADER_LEN + len + 1;
            if self.buf.len() < total {
                return None;
            }
            let payload = &self.buf[HEADER_LEN..total - 1];
            if xor_checksum(payload) != self.buf[total - 1] {
                trace!("stats checksum mismatch, resyncing");
                self.buf.drain(..1);
                continue;
            }
            let rest = self.buf.split_off(total);
            let report = std::mem::replace(&mut self.buf, rest);
            return Some(Bytes::from(report));
        }
    }
}

impl Framer for StatsFramer {
    fn protocol(&self) -> &'static str {
        "stats"
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn report(payload: &[u8]) -> Vec<u8> {
        let mut wire = SYNC.to_vec();
        wire.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        wire.extend_from_slice(payload);
        wire.push(xor_checksum(payload));
        wire
    }

    #[test]
    fn recovers_single_report() {
        let wire = report(b"cpu:42 heap:1280");
        let mut framer = StatsFramer::new();

        let step = framer.step(&wire);
        assert_eq!(step.consumed, wire.len());
        assert_eq!(step.frame.unwrap(), Bytes::from(wire));
    }

    #[test]
    fn empty_report_is_five_bytes() {
        let wire = report(b"");
        assert_eq!(wire, vec![0x7E, 0x81, 0x00, 0x00, 0x00]);

        let mut framer = StatsFramer::new();
        assert_eq!(framer.step(&wire).frame.unwrap(), Bytes::from(wire));
    }

    #[test]
    fn chunking_never_changes_the_report() {
        let wire = report(b"loop:250us worst:1.2ms");

        for split in 1..wire.len() {
            let mut framer = StatsFramer::new();
            let first = framer.step(&wire[..split]);
            let second = framer.step(&wire[split..]);
            assert_eq!(first.consumed + second.consumed, wire.len());
            assert_eq!(
                first.frame.or(second.frame),
                Some(Bytes::from(wire.clone())),
                "report lost when split at byte {split}"
            );
        }
    }

    #[test]
    fn sync_pair_split_across_chunks_survives() {
        let wire = report(b"uptime:3600");
        let mut framer = StatsFramer::new();

        // Garbage ending in 0x7E; the 0x81 arrives with the next chunk.
        let head = vec![0x10, 0x20, wire[0]];
        assert!(framer.step(&head).frame.is_none());

        let step = framer.step(&wire[1..]);
        assert_eq!(step.frame.unwrap(), Bytes::from(wire));
    }

    #[test]
    fn garbage_without_sync_is_dropped() {
        let mut framer = StatsFramer::new();
        let step = framer.step(&[0x81, 0x7D, 0x00, 0xFF]);
        assert_eq!(step.consumed, 4);
        assert!(step.frame.is_none());

        let wire = report(b"ok");
        assert_eq!(framer.step(&wire).frame.unwrap(), Bytes::from(wire));
    }

    #[test]
    fn oversize_length_resyncs() {
        // Sync pair with a length far over the ring cap, then a real
        // report. No 0x7E appears until the real sync pair.
        let mut stream = vec![0x7E, 0x81, 0xFF, 0xFF, 0x01, 0x02];
        let wire = report(b"recovered");
        stream.extend_from_slice(&wire);

        let mut framer = StatsFramer::new();
        assert_eq!(framer.step(&stream).frame.unwrap(), Bytes::from(wire));
    }

    #[test]
    fn checksum_mismatch_resyncs() {
        let mut corrupt = report(b"drift:0.1");
        let len = corrupt.len();
        corrupt[len - 1] ^= 0xFF;
        let wire = report(b"drift:0.2");

        let mut stream = corrupt;
        stream.extend_from_slice(&wire);
        let mut framer = StatsFramer::new();
        assert_eq!(framer.step(&stream).frame.unwrap(), Bytes::from(wire));
    }

    #[test]
    fn back_to_back_reports_drain_one_per_step() {
        let first = report(b"a:1");
        let second = report(b"b:2");
        let mut stream = first.clone();
        stream.extend_from_slice(&second);

        let mut framer = StatsFramer::new();
        assert_eq!(framer.step(&stream).frame.unwrap(), Bytes::from(first));
        assert_eq!(framer.step(&[]).frame.unwrap(), Bytes::from(second));
        assert!(framer.step(&[]).frame.is_none());
    }

    #[test]
    fn reset_discards_partial_report() {
        let mut framer = StatsFramer::new();
        // Header promising 512 payload bytes that never arrive.
        framer.step(&[0x7E, 0x81, 0x00, 0x02, 0xAA, 0xBB]);
        framer.reset();

        let wire = report(b"fresh");
        assert_eq!(framer.step(&wire).frame.unwrap(), Bytes::from(wire));
    }
}
