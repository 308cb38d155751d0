//! Framer and filter contracts
//!
//! A framer turns an unstructured byte stream into discrete protocol
//! frames. The fabric feeds it whatever chunk the transport produced;
//! the framer owns whatever buffering it needs between calls, so the
//! chunking of the input never changes which frames come out.

use crate::error::PluginError;
use bytes::Bytes;

/// Outcome of one [`Framer::step`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramerStep {
    /// How many input bytes the framer used. Unconsumed trailing bytes
    /// must be offered again on the next call.
    pub consumed: usize,
    /// A complete, validated frame, if one finished on this call.
    pub frame: Option<Bytes>,
}

impl FramerStep {
    /// Progress without a finished frame.
    pub fn consumed(consumed: usize) -> Self {
        Self { consumed, frame: None }
    }

    /// Progress that finished a frame.
    pub fn emit(consumed: usize, frame: Bytes) -> Self {
        Self { consumed, frame: Some(frame) }
    }
}

/// Incremental stream-to-frame decoder for one protocol family.
///
/// # Contract
///
/// - At most one frame per call. Callers loop until a call reports
///   no frame and no consumed bytes.
/// - When the input contains no trace of frame sync, the whole input
///   is consumed; a framer never stalls on garbage.
/// - A failed integrity check resynchronizes to the next candidate
///   sync point. Malformed input is recovered from, never an error.
/// - `step` with an empty slice is valid and drains any frame already
///   completed in the internal buffer.
pub trait Framer: Send {
    /// Protocol family this framer recovers, e.g. `"sbp"`.
    fn protocol(&self) -> &'static str;

    /// Feed a chunk of the port byte stream.
    fn step(&mut self, input: &[u8]) -> FramerStep;

    /// Drop all buffered state and return to sync-seeking.
    fn reset(&mut self);
}

/// Decides whether a recovered frame continues down the pipeline.
///
/// Filters see the raw frame bytes before the envelope is built, so a
/// rejected frame costs nothing beyond the framing work already done.
/// Filters may keep state (rate limiting, duplicate suppression), hence
/// `&mut self`.
pub trait FrameFilter: Send {
    /// Filter name for logs and adapter options.
    fn name(&self) -> &'static str;

    /// True to keep the frame, false to drop it.
    fn allow(&mut self, frame: &[u8]) -> bool;
}

/// Filter built from a plain predicate closure.
///
/// # Example
///
/// ```
/// use loran_core::{FrameFilter, PredicateFilter};
///
/// let mut short_only = PredicateFilter::new("short-only", |frame: &[u8]| frame.len() <= 16);
/// assert!(short_only.allow(b"\x55\x02\x00"));
/// assert!(!short_only.allow(&[0u8; 64]));
/// ```
pub struct PredicateFilter<F> {
    name: &'static str,
    predicate: F,
}

impl<F> PredicateFilter<F>
where
    F: FnMut(&[u8]) -> bool + Send,
{
    /// Wrap a predicate under the given filter name.
    pub fn new(name: &'static str, predicate: F) -> Self {
        Self { name, predicate }
    }
}

impl<F> FrameFilter for PredicateFilter<F>
where
    F: FnMut(&[u8]) -> bool + Send,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn allow(&mut self, frame: &[u8]) -> bool {
        (self.predicate)(frame)
    }
}

/// Factory signature registries use to build framers on demand.
pub type FramerFactory =
    Box<dyn Fn() -> Result<Box<dyn Framer>, PluginError> + Send + Sync>;

/// Factory signature registries use to build filters on demand.
pub type FilterFactory =
    Box<dyn Fn() -> Result<Box<dyn FrameFilter>, PluginError> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal framer used to pin down the step contract: frames are
    // newline-delimited runs, garbage is anything before the first
    // printable byte.
    struct LineFramer {
        buf: Vec<u8>,
    }

    impl Framer for LineFramer {
        fn protocol(&self) -> &'static str {
            "line"
        }

        fn step(&mut self, input: &[u8]) -> FramerStep {
            if let Some(nl) = self.buf.iter().position(|&b| b == b'\n') {
                let rest = self.buf.split_off(nl + 1);
                let line = std::mem::replace(&mut self.buf, rest);
                return FramerStep::emit(0, Bytes::from(line));
            }
            self.buf.extend_from_slice(input);
            let consumed = input.len();
            match self.buf.iter().position(|&b| b == b'\n') {
                Some(nl) => {
                    let rest = self.buf.split_off(nl + 1);
                    let line = std::mem::replace(&mut self.buf, rest);
                    FramerStep::emit(consumed, Bytes::from(line))
                }
                None => FramerStep::consumed(consumed),
            }
        }

        fn reset(&mut self) {
            self.buf.clear();
        }
    }

    #[test]
    fn step_contract_survives_split_input() {
        let mut framer = LineFramer { buf: Vec::new() };

        let step = framer.step(b"hel");
        assert_eq!(step.consumed, 3);
        assert!(step.frame.is_none());

        let step = framer.step(b"lo\nwo");
        assert_eq!(step.consumed, 5);
        assert_eq!(step.frame, Some(Bytes::from_static(b"hello\n")));

        // Empty-input drain finds nothing further buffered.
        let step = framer.step(&[]);
        assert_eq!(step.consumed, 0);
        assert!(step.frame.is_none());
    }

    #[test]
    fn reset_discards_partial_state() {
        let mut framer = LineFramer { buf: Vec::new() };
        framer.step(b"partial");
        framer.reset();

        let step = framer.step(b"done\n");
        assert_eq!(step.frame, Some(Bytes::from_static(b"done\n")));
    }

    #[test]
    fn predicate_filter_reports_name_and_applies() {
        let mut filter = PredicateFilter::new("even-length", |f: &[u8]| f.len() % 2 == 0);
        assert_eq!(filter.name(), "even-length");
        assert!(filter.allow(b"ab"));
        assert!(!filter.allow(b"abc"));
    }

    #[test]
    fn stateful_filter_can_mutate() {
        let mut seen = 0usize;
        let mut first_two = PredicateFilter::new("first-two", move |_: &[u8]| {
            seen += 1;
            seen <= 2
        });
        assert!(first_two.allow(b"a"));
        assert!(first_two.allow(b"b"));
        assert!(!first_two.allow(b"c"));
    }
}
