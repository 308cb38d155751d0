//! Port pipeline: chunks in, frames out
//!
//! A [`Pipeline`] owns one framer, an ordered filter chain, and a set
//! of sinks. Byte chunks from a source endpoint pass through the
//! framer, surviving frames are labelled with the port name and
//! fanned out to every sink as one batch per chunk:
//!
//! ```text
//! chunks ──► framer ──► filters ──► Frame batch ──► sinks
//! ```

use crate::endpoint::Endpoint;
use crate::error::{FabricError, Result};
use crate::reactor::{EventHandler, LoopCx, Reactor, Token};
use async_trait::async_trait;
use loran_core::{Frame, FrameFilter, FrameSink, Framer};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A per-port ingest pipeline
///
/// Built with [`Pipeline::for_port`], then attached to a reactor with
/// [`Pipeline::attach`]. Filters run in registration order and any
/// rejection drops the frame before it reaches a sink.
pub struct Pipeline {
    port: Arc<str>,
    framer: Box<dyn Framer>,
    filters: Vec<Box<dyn FrameFilter>>,
    sinks: Vec<Arc<dyn FrameSink>>,
}

impl Pipeline {
    /// Start building a pipeline for a named port
    pub fn for_port(port: impl Into<Arc<str>>, framer: Box<dyn Framer>) -> Self {
        Self {
            port: port.into(),
            framer,
            filters: Vec::new(),
            sinks: Vec::new(),
        }
    }

    /// Append a filter to the chain
    pub fn filter(mut self, filter: Box<dyn FrameFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a sink to fan frames out to
    pub fn sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Port name frames will carry
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Number of attached sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Feed one chunk of bytes through the framer and dispatch the
    /// resulting frames.
    ///
    /// The framer is stepped until it stops making progress, so a
    /// single chunk may produce zero, one, or many frames. Frames
    /// rejected by a filter are dropped silently apart from metrics.
    pub async fn ingest_chunk(&mut self, chunk: &[u8]) {
        if let Some(metrics) = crate::metrics::Metrics::get() {
            metrics.chunks_received.fetch_add(1, Ordering::Relaxed);
            metrics
                .bytes_consumed
                .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        }

        let mut batch = Vec::new();
        let mut rest = chunk;
        loop {
            let step = self.framer.step(rest);
            let consumed = step.consumed.min(rest.len());
            rest = &rest[consumed..];
            match step.frame {
                Some(payload) => {
                    if self.passes_filters(&payload) {
                        batch.push(Frame::new(
                            self.port.clone(),
                            self.framer.protocol(),
                            payload,
                        ));
                    }
                }
                None if consumed == 0 => break,
                None => {}
            }
        }

        if batch.is_empty() {
            return;
        }

        if let Some(metrics) = crate::metrics::Metrics::get() {
            metrics
                .frames_emitted
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
        }

        for sink in &self.sinks {
            if let Err(error) = sink.emit(&batch).await {
                error!(
                    port = %self.port,
                    sink = sink.name(),
                    %error,
                    "Sink rejected frame batch"
                );
                if let Some(metrics) = crate::metrics::Metrics::get() {
                    metrics.sink_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn passes_filters(&mut self, payload: &[u8]) -> bool {
        for filter in &mut self.filters {
            if !filter.allow(payload) {
                if let Some(metrics) = crate::metrics::Metrics::get() {
                    metrics.frames_filtered.fetch_add(1, Ordering::Relaxed);
                }
                return false;
            }
        }
        true
    }

    /// Register this pipeline on a reactor, driven by a source endpoint
    ///
    /// The endpoint must be pollable; readiness events drain it through
    /// [`Pipeline::ingest_chunk`]. When the endpoint reports closed the
    /// pipeline detaches itself at the next poll boundary.
    pub fn attach(self, reactor: &mut Reactor, source: Arc<Endpoint>) -> Result<Token> {
        info!(
            port = %self.port,
            protocol = self.framer.protocol(),
            address = %source.address(),
            "Attaching pipeline"
        );
        let handler = PipelineHandler {
            source: Arc::clone(&source),
            pipeline: self,
        };
        reactor.add_endpoint(source, handler)
    }
}

struct PipelineHandler {
    source: Arc<Endpoint>,
    pipeline: Pipeline,
}

#[async_trait]
impl EventHandler for PipelineHandler {
    async fn handle(&mut self, cx: &mut LoopCx) -> Result<()> {
        loop {
            match self.source.try_receive() {
                Ok(Some(chunk)) => self.pipeline.ingest_chunk(&chunk).await,
                Ok(None) => break,
                Err(FabricError::Closed) => {
                    debug!(port = %self.pipeline.port, "Source closed, detaching pipeline");
                    cx.remove(cx.token());
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::framers::{BytesFramer, DelimitedFramer};
    use bytes::Bytes;
    use loran_core::{PluginError, PredicateFilter};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU64;

    // ========================================================================
    // Test sinks
    // ========================================================================

    struct CaptureSink {
        frames: Mutex<Vec<Frame>>,
        emit_calls: AtomicU64,
    }

    impl CaptureSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
                emit_calls: AtomicU64::new(0),
            })
        }

        fn payloads(&self) -> Vec<Bytes> {
            self.frames.lock().iter().map(|f| f.payload.clone()).collect()
        }
    }

    #[async_trait]
    impl FrameSink for CaptureSink {
        fn name(&self) -> &str {
            "capture"
        }

        async fn emit(&self, frames: &[Frame]) -> std::result::Result<(), PluginError> {
            self.emit_calls.fetch_add(1, Ordering::SeqCst);
            self.frames.lock().extend_from_slice(frames);
            Ok(())
        }

        async fn health(&self) -> bool {
            true
        }
    }

    struct FailingSink;

    #[async_trait]
    impl FrameSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn emit(&self, _frames: &[Frame]) -> std::result::Result<(), PluginError> {
            Err(PluginError::Send("wire unplugged".to_string()))
        }

        async fn health(&self) -> bool {
            false
        }
    }

    /// Encode a message with a single-byte varint length prefix
    fn delimited(payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() < 0x80);
        let mut wire = vec![payload.len() as u8];
        wire.extend_from_slice(payload);
        wire
    }

    // ========================================================================
    // Framing and labelling
    // ========================================================================

    #[tokio::test]
    async fn test_frames_carry_port_and_protocol() {
        let capture = CaptureSink::new();
        let mut pipeline = Pipeline::for_port("uart0", Box::new(DelimitedFramer::new()))
            .sink(capture.clone());

        pipeline.ingest_chunk(&delimited(b"position")).await;

        let frames = capture.frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].port(), "uart0");
        assert_eq!(frames[0].protocol(), "protobuf");
        assert_eq!(frames[0].payload, Bytes::from_static(b"position"));
    }

    #[tokio::test]
    async fn test_message_split_across_chunks_reassembles() {
        let capture = CaptureSink::new();
        let mut pipeline = Pipeline::for_port("uart0", Box::new(DelimitedFramer::new()))
            .sink(capture.clone());

        let wire = delimited(b"split me");
        for byte in &wire {
            pipeline.ingest_chunk(std::slice::from_ref(byte)).await;
        }

        assert_eq!(capture.payloads(), vec![Bytes::from_static(b"split me")]);
    }

    #[tokio::test]
    async fn test_back_to_back_messages_emit_as_one_batch() {
        let capture = CaptureSink::new();
        let mut pipeline = Pipeline::for_port("uart0", Box::new(DelimitedFramer::new()))
            .sink(capture.clone());

        let mut wire = delimited(b"first");
        wire.extend_from_slice(&delimited(b"second"));
        pipeline.ingest_chunk(&wire).await;

        assert_eq!(
            capture.payloads(),
            vec![Bytes::from_static(b"first"), Bytes::from_static(b"second")]
        );
        // Both frames travelled in a single emit call
        assert_eq!(capture.emit_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_chunk_is_a_no_op() {
        let capture = CaptureSink::new();
        let mut pipeline =
            Pipeline::for_port("uart0", Box::new(BytesFramer::new())).sink(capture.clone());

        pipeline.ingest_chunk(&[]).await;

        assert!(capture.frames.lock().is_empty());
        assert_eq!(capture.emit_calls.load(Ordering::SeqCst), 0);
    }

    // ========================================================================
    // Filters
    // ========================================================================

    #[tokio::test]
    async fn test_filter_rejection_drops_frame() {
        let capture = CaptureSink::new();
        let mut pipeline = Pipeline::for_port("uart0", Box::new(DelimitedFramer::new()))
            .filter(Box::new(PredicateFilter::new("no-x", |frame: &[u8]| {
                !frame.starts_with(b"x")
            })))
            .sink(capture.clone());

        let mut wire = delimited(b"xdrop");
        wire.extend_from_slice(&delimited(b"keep"));
        pipeline.ingest_chunk(&wire).await;

        assert_eq!(capture.payloads(), vec![Bytes::from_static(b"keep")]);
    }

    #[tokio::test]
    async fn test_filters_run_in_order() {
        let capture = CaptureSink::new();
        let mut pipeline = Pipeline::for_port("uart0", Box::new(DelimitedFramer::new()))
            .filter(Box::new(PredicateFilter::new("min-len", |frame: &[u8]| {
                frame.len() >= 2
            })))
            .filter(Box::new(PredicateFilter::new("no-a", |frame: &[u8]| {
                !frame.starts_with(b"a")
            })))
            .sink(capture.clone());

        let mut wire = delimited(b"z");
        wire.extend_from_slice(&delimited(b"abc"));
        wire.extend_from_slice(&delimited(b"ok"));
        pipeline.ingest_chunk(&wire).await;

        assert_eq!(capture.payloads(), vec![Bytes::from_static(b"ok")]);
    }

    // ========================================================================
    // Sink fan-out
    // ========================================================================

    #[tokio::test]
    async fn test_all_sinks_receive_each_batch() {
        let first = CaptureSink::new();
        let second = CaptureSink::new();
        let mut pipeline = Pipeline::for_port("uart0", Box::new(DelimitedFramer::new()))
            .sink(first.clone())
            .sink(second.clone());

        pipeline.ingest_chunk(&delimited(b"both")).await;

        assert_eq!(first.payloads(), vec![Bytes::from_static(b"both")]);
        assert_eq!(second.payloads(), vec![Bytes::from_static(b"both")]);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_starve_other_sinks() {
        let capture = CaptureSink::new();
        let mut pipeline = Pipeline::for_port("uart0", Box::new(DelimitedFramer::new()))
            .sink(Arc::new(FailingSink))
            .sink(capture.clone());

        pipeline.ingest_chunk(&delimited(b"still here")).await;

        assert_eq!(capture.payloads(), vec![Bytes::from_static(b"still here")]);
    }

    #[tokio::test]
    async fn test_raw_passthrough_forwards_chunk_verbatim() {
        let capture = CaptureSink::new();
        let mut pipeline =
            Pipeline::for_port("can0", Box::new(BytesFramer::new())).sink(capture.clone());

        pipeline.ingest_chunk(b"\x00\x01\x02raw").await;

        assert_eq!(capture.payloads(), vec![Bytes::from_static(b"\x00\x01\x02raw")]);
        assert_eq!(capture.frames.lock()[0].protocol(), "bytes");
    }
}
