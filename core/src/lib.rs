//! loran-core - Core types for the loran device fabric
//!
//! This crate provides the foundational types shared between the loran
//! fabric and external protocol plugins (framers, filters, sinks):
//!
//! - [`Frame`] - the pipeline envelope for one recovered protocol frame
//! - [`Framer`] trait - incremental byte-stream-to-frame decoder
//! - [`FrameFilter`] trait - per-frame keep/drop decision
//! - [`FrameSink`] trait - async interface for delivering frames
//! - [`PluginError`] - error type for plugin operations
//!
//! # Why this crate exists
//!
//! Protocol crates (like `loran-protocols`) need to implement the
//! `Framer` trait and build `Frame` values. Without `loran-core`, they
//! would depend on `loran-fabric`, but the fabric also wants to depend
//! on protocol crates for its built-in adapters, creating a cyclic
//! dependency.
//!
//! By extracting the contracts here, we break the cycle:
//!
//! ```text
//! loran-core ◄── loran-fabric
//!     ▲
//!     └────────── loran-protocols
//! ```
//!
//! Now daemons can combine the fabric with any protocol crate without
//! cycles.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![warn(missing_docs)]

mod error;
mod sink;
/// The frame envelope
pub mod frame;
/// Framer and filter contracts
pub mod framer;

pub use error::PluginError;
pub use frame::Frame;
pub use framer::{FilterFactory, FrameFilter, Framer, FramerFactory, FramerStep, PredicateFilter};
pub use sink::FrameSink;
