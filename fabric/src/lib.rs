//! LORAN fabric - endpoint and event-loop infrastructure
//!
//! Plumbing shared by the daemons on a navigation device: message
//! endpoints over TCP and Unix sockets, a single-threaded cooperative
//! event loop, framing pipelines, and the settings registry with its
//! wire service.
//!
//! # Data flow
//!
//! ```text
//! Endpoint ──► Reactor ──► Pipeline (framer ► filters) ──► FrameSinks
//!                │
//!                └──► SettingsService (REQ/REP)
//! ```
//!
//! Framers and filters are pluggable via the traits in `loran-core`;
//! protocol crates register their implementations in a
//! [`PluginRegistry`] and daemons wire pipelines from there.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod framers;
pub mod metrics;
pub mod pipeline;
pub mod reactor;
pub mod registry;
pub mod settings;
pub mod table;

pub use config::{Config, LogFormat};
pub use endpoint::{Address, Endpoint, Mode, Role, Target};
pub use error::{FabricError, PluginError, Result};
pub use framers::{AllowAllFilter, BytesFramer, DelimitedFramer};
pub use metrics::{Metrics, MetricsSnapshot};
pub use pipeline::Pipeline;
pub use reactor::{EventHandler, EventKind, LoopControl, LoopCx, Reactor, Token};
pub use registry::PluginRegistry;
pub use settings::{
    FileStore, RegisterOutcome, Setting, SettingKind, SettingsRegistry, SettingsService,
};
pub use table::Table;
