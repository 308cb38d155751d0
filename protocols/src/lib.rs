//! LORAN protocols - wire-protocol framers for device ports
//!
//! Every serial, USB, and CAN port on the device produces an
//! unstructured byte stream; each module here recovers one protocol's
//! frames from such a stream. All framers implement the
//! [`loran_core::Framer`] contract: chunking never changes the frames
//! that come out, garbage never stalls the scan, and a failed
//! integrity check costs at most one sync candidate.
//!
//! Daemons normally do not name these types directly. They call
//! [`register_builtin`] once at startup and build pipelines from the
//! registry by name, which is also how the generic port adapter picks
//! its framing from `--framer-in` / `--filter-in` options (see
//! [`info`]).

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod anpp;
pub mod filter;
pub mod info;
pub mod j1939;
pub mod nmea;
pub mod sbp;
pub mod stats;

mod crc;

pub use anpp::AnppFramer;
pub use filter::SbpAllowlistFilter;
pub use info::{catalog, lookup, ProtocolInfo};
pub use j1939::J1939Framer;
pub use nmea::NmeaFramer;
pub use sbp::SbpFramer;
pub use stats::StatsFramer;

use loran_core::{FrameFilter, Framer, PluginError};
use loran_fabric::PluginRegistry;

/// Register every framer and filter this crate ships.
///
/// Meant for a registry that already holds the fabric built-ins; a
/// `DuplicateName` error means the caller claimed one of these names
/// for something of its own first.
pub fn register_builtin(registry: &mut PluginRegistry) -> Result<(), PluginError> {
    registry.register_framer(
        "sbp",
        Box::new(|| Ok(Box::new(SbpFramer::new()) as Box<dyn Framer>)),
    )?;
    registry.register_framer(
        "nmea",
        Box::new(|| Ok(Box::new(NmeaFramer::new()) as Box<dyn Framer>)),
    )?;
    registry.register_framer(
        "anpp",
        Box::new(|| Ok(Box::new(AnppFramer::new()) as Box<dyn Framer>)),
    )?;
    registry.register_framer(
        "j1939",
        Box::new(|| Ok(Box::new(J1939Framer::new()) as Box<dyn Framer>)),
    )?;
    registry.register_framer(
        "stats",
        Box::new(|| Ok(Box::new(StatsFramer::new()) as Box<dyn Framer>)),
    )?;
    registry.register_filter(
        "sbp-allowlist",
        Box::new(|| Ok(Box::new(SbpAllowlistFilter::base_station()) as Box<dyn FrameFilter>)),
    )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_cataloged_framer() {
        let mut registry = PluginRegistry::with_builtins();
        register_builtin(&mut registry).unwrap();

        for info in catalog() {
            assert!(
                registry.has_framer(info.framer),
                "catalog names unregistered framer {}",
                info.framer
            );
            if let Some(filter) = info.filter {
                assert!(registry.has_filter(filter));
            }
        }
    }

    #[test]
    fn registered_framers_report_their_protocol() {
        let mut registry = PluginRegistry::with_builtins();
        register_builtin(&mut registry).unwrap();

        for name in ["sbp", "nmea", "anpp", "j1939", "stats"] {
            let framer = registry.framer(name).unwrap();
            assert_eq!(framer.protocol(), name);
        }
    }

    #[test]
    fn double_registration_reports_the_clash() {
        let mut registry = PluginRegistry::with_builtins();
        register_builtin(&mut registry).unwrap();

        let err = register_builtin(&mut registry).unwrap_err();
        assert_eq!(err, PluginError::DuplicateName("sbp".to_string()));
    }
}
