//! Fabric counters
//!
//! Lock-free counters bumped from the hot paths and logged as periodic
//! snapshots. On a device there is nothing to scrape, so the log is the
//! export surface; daemons arrange a reactor timer that calls
//! [`Metrics::log_snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing::info;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All fabric counters
#[derive(Debug, Default)]
pub struct Metrics {
    // ─────────────────────────────────────────────────────────────────────────
    // Endpoint traffic
    // ─────────────────────────────────────────────────────────────────────────
    /// Payloads written to peers
    pub payloads_sent: AtomicU64,

    /// Payloads queued from peers
    pub payloads_received: AtomicU64,

    /// Peers that completed a connection
    pub peer_connects: AtomicU64,

    /// Peers that went away
    pub peer_disconnects: AtomicU64,

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline
    // ─────────────────────────────────────────────────────────────────────────
    /// Chunks fed into framers
    pub chunks_received: AtomicU64,

    /// Raw bytes fed into framers
    pub bytes_consumed: AtomicU64,

    /// Frames that cleared the filter chain
    pub frames_emitted: AtomicU64,

    /// Frames dropped by a filter
    pub frames_filtered: AtomicU64,

    /// Sink emit calls that returned an error
    pub sink_errors: AtomicU64,

    // ─────────────────────────────────────────────────────────────────────────
    // Settings service
    // ─────────────────────────────────────────────────────────────────────────
    /// Read requests processed
    pub settings_reads: AtomicU64,

    /// Write requests processed
    pub settings_writes: AtomicU64,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub payloads_sent: u64,
    pub payloads_received: u64,
    pub peer_connects: u64,
    pub peer_disconnects: u64,
    pub chunks_received: u64,
    pub bytes_consumed: u64,
    pub frames_emitted: u64,
    pub frames_filtered: u64,
    pub sink_errors: u64,
    pub settings_reads: u64,
    pub settings_writes: u64,
}

impl Metrics {
    /// Initialize the global instance (call once at startup)
    ///
    /// Later calls return the instance already installed.
    pub fn init() -> &'static Metrics {
        METRICS.get_or_init(Metrics::default)
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet; callers on
    /// hot paths treat that as "don't count".
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Copy every counter at once
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            payloads_sent: self.payloads_sent.load(Ordering::Relaxed),
            payloads_received: self.payloads_received.load(Ordering::Relaxed),
            peer_connects: self.peer_connects.load(Ordering::Relaxed),
            peer_disconnects: self.peer_disconnects.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            bytes_consumed: self.bytes_consumed.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            frames_filtered: self.frames_filtered.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            settings_reads: self.settings_reads.load(Ordering::Relaxed),
            settings_writes: self.settings_writes.load(Ordering::Relaxed),
        }
    }

    /// Log the current counters at info level
    pub fn log_snapshot(&self) {
        let snap = self.snapshot();
        info!(
            payloads_sent = snap.payloads_sent,
            payloads_received = snap.payloads_received,
            peer_connects = snap.peer_connects,
            peer_disconnects = snap.peer_disconnects,
            chunks_received = snap.chunks_received,
            bytes_consumed = snap.bytes_consumed,
            frames_emitted = snap.frames_emitted,
            frames_filtered = snap.frames_filtered,
            sink_errors = snap.sink_errors,
            settings_reads = snap.settings_reads,
            settings_writes = snap.settings_writes,
            "Fabric stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let first = Metrics::init();
        let second = Metrics::init();
        assert!(std::ptr::eq(first, second));
        assert!(Metrics::get().is_some());
    }

    #[test]
    fn test_snapshot_sees_increments() {
        // The global instance is shared across tests, so assert on
        // deltas rather than absolute values.
        let metrics = Metrics::init();
        let before = metrics.snapshot();

        metrics.frames_emitted.fetch_add(3, Ordering::Relaxed);
        metrics.sink_errors.fetch_add(1, Ordering::Relaxed);

        let after = metrics.snapshot();
        assert_eq!(after.frames_emitted - before.frames_emitted, 3);
        assert_eq!(after.sink_errors - before.sink_errors, 1);

        // Logging a snapshot must not panic regardless of state
        metrics.log_snapshot();
    }
}
