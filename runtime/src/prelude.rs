//! Convenience re-exports for daemon authors.
//!
//! ```rust
//! use loran_runtime::prelude::*;
//! ```

// Core contracts
pub use loran_core::{Frame, FrameFilter, FrameSink, Framer, FramerStep, PredicateFilter};

// Endpoints and the event loop
pub use loran_fabric::{
    Endpoint, EventHandler, EventKind, LoopControl, LoopCx, Reactor, Role, Token,
};

// Pipelines and plugins
pub use loran_fabric::{AllowAllFilter, BytesFramer, DelimitedFramer, Pipeline, PluginRegistry};

// Settings
pub use loran_fabric::{
    FileStore, RegisterOutcome, Setting, SettingKind, SettingsRegistry, SettingsService,
};

// Cleanup-on-remove storage
pub use loran_fabric::Table;

// Protocol framers
pub use loran_protocols::{
    catalog, lookup, AnppFramer, J1939Framer, NmeaFramer, ProtocolInfo, SbpAllowlistFilter,
    SbpFramer, StatsFramer,
};

// Error types
pub use loran_fabric::{FabricError, PluginError};

// Zero-copy payload
pub use bytes::Bytes;

// Runtime
pub use crate::{Daemon, RuntimeBuilder};
