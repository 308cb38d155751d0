//! SBP message-type allowlist filter
//!
//! Ports forwarding a navigation stream off the device usually want a
//! handful of message types, not the full firehose. The allowlist
//! filter reads the type field out of each framed SBP message and
//! keeps only the configured set. Frames that are not SBP-shaped are
//! dropped outright.

use loran_core::{FrameFilter, PluginError};
use std::collections::HashSet;

use crate::sbp::PREAMBLE;

/// Message types a base station forwards to its rovers: base position
/// (LLH and ECEF) and the observation messages.
const BASE_STATION_IDS: [u16; 4] = [68, 72, 73, 74];

/// Shortest well-formed SBP frame: header plus CRC.
const MIN_FRAME_LEN: usize = 8;

/// Keeps SBP frames whose message type is in a configured id set.
#[derive(Debug)]
pub struct SbpAllowlistFilter {
    allowed: HashSet<u16>,
}

impl SbpAllowlistFilter {
    /// Allow exactly the given message types.
    pub fn new(ids: impl IntoIterator<Item = u16>) -> Self {
        Self {
            allowed: ids.into_iter().collect(),
        }
    }

    /// The default set registered under `"sbp-allowlist"`: what a base
    /// station needs to forward for RTK corrections.
    pub fn base_station() -> Self {
        Self::new(BASE_STATION_IDS)
    }

    /// Parse a comma-separated id list, decimal or `0x`-prefixed hex.
    /// Empty elements are skipped so trailing commas are harmless.
    pub fn from_csv(spec: &str) -> Result<Self, PluginError> {
        let mut allowed = HashSet::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let id = match part.strip_prefix("0x") {
                Some(hex) => u16::from_str_radix(hex, 16),
                None => part.parse(),
            }
            .map_err(|_| PluginError::Init(format!("bad SBP message id {part:?}")))?;
            allowed.insert(id);
        }
        Ok(Self { allowed })
    }

    /// Number of allowed message types.
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    /// True when no message type passes.
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

impl FrameFilter for SbpAllowlistFilter {
    fn name(&self) -> &'static str {
        "sbp-allowlist"
    }

    fn allow(&mut self, frame: &[u8]) -> bool {
        if frame.len() < MIN_FRAME_LEN || frame[0] != PREAMBLE {
            return false;
        }
        let msg_type = u16::from_le_bytes([frame[1], frame[2]]);
        self.allowed.contains(&msg_type)
    }
}
