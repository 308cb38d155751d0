//! The frame envelope that flows from ports to sinks

use bytes::Bytes;
use std::sync::Arc;

/// A single protocol frame recovered from a port byte stream.
///
/// Payload bytes are reference-counted ([`Bytes`]), so cloning a frame
/// for fan-out to several sinks never copies the frame body. Port and
/// protocol labels are shared `Arc<str>` for the same reason: one
/// pipeline stamps thousands of frames with identical labels.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Name of the port the bytes arrived on (e.g. `uart0`).
    pub port: Arc<str>,
    /// Protocol family the framer recovered (e.g. `sbp`, `nmea`).
    pub protocol: Arc<str>,
    /// Unix timestamp in nanoseconds when the frame was recovered.
    pub received_at: i64,
    /// Complete frame bytes, exactly as they should appear on the wire.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame stamped with the current time.
    pub fn new(port: impl Into<Arc<str>>, protocol: impl Into<Arc<str>>, payload: Bytes) -> Self {
        Self {
            port: port.into(),
            protocol: protocol.into(),
            received_at: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            payload,
        }
    }

    /// Port label as a plain string slice.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Protocol label as a plain string slice.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Frame body length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True when the frame carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
