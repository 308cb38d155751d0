//! Device settings: typed registry, persistence, and the wire service
//!
//! Daemons register their settings at startup, persisted overrides are
//! spliced in from the settings file, and a [`SettingsService`] answers
//! read/write requests from other processes over a REP endpoint.

pub mod codec;
mod registry;
mod service;
mod store;

pub use registry::{RegisterOutcome, Setting, SettingKind, SettingsRegistry};
pub use service::SettingsService;
pub use store::FileStore;
