//! Sink trait for fabric plugins
//!
//! The [`FrameSink`] trait defines the interface for forwarding recovered
//! frames out of a pipeline. Sinks are the output side of a port adapter.

use crate::error::PluginError;
use crate::frame::Frame;
use async_trait::async_trait;

/// Sink trait - forwards Frames to destinations
///
/// Each sink handles delivery to one destination. A pipeline fans out
/// to every sink attached to it, so a frame recovered once can feed a
/// publish endpoint, a log, and a capture buffer at the same time.
///
/// # Implementation Requirements
///
/// - Sinks must be `Send + Sync` for use across async tasks
/// - The `emit` method receives a batch of frames and should handle them atomically
/// - Health checks should be lightweight and not affect normal operation
/// - Shutdown should flush any pending frames and release resources
///
/// # Example
///
/// ```ignore
/// use loran_core::{Frame, FrameSink, PluginError};
/// use async_trait::async_trait;
///
/// struct UdpSink {
///     socket: tokio::net::UdpSocket,
/// }
///
/// #[async_trait]
/// impl FrameSink for UdpSink {
///     fn name(&self) -> &str {
///         "udp"
///     }
///
///     async fn emit(&self, frames: &[Frame]) -> Result<(), PluginError> {
///         for frame in frames {
///             self.socket
///                 .send(&frame.payload)
///                 .await
///                 .map_err(|e| PluginError::Send(e.to_string()))?;
///         }
///         Ok(())
///     }
///
///     async fn health(&self) -> bool {
///         true
///     }
/// }
/// ```
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Returns the sink's name for identification and logging
    ///
    /// This should be a short, descriptive name. Endpoint sinks report
    /// the address they were opened with.
    fn name(&self) -> &str;

    /// Deliver a batch of frames to the destination
    ///
    /// # Arguments
    ///
    /// * `frames` - Slice of Frames to deliver. May be empty.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - All frames were accepted for delivery
    /// * `Err(PluginError)` - One or more frames failed to send
    async fn emit(&self, frames: &[Frame]) -> Result<(), PluginError>;

    /// Check if the destination is able to accept frames
    ///
    /// Called periodically for diagnostics. It should be cheap and must
    /// not block for extended periods.
    async fn health(&self) -> bool;

    /// Graceful shutdown
    ///
    /// Called when the daemon is shutting down. Implementations should
    /// flush buffered frames and release held resources. The default
    /// implementation returns `Ok(())` for sinks that don't need cleanup.
    async fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}
