//! Protocol catalog for port adapters
//!
//! Ports are wired up by a generic adapter process that takes its
//! framing on the command line. The catalog is the single source of
//! truth mapping a protocol name to the adapter options that select
//! it, so the settings UI, the daemon, and the adapter launcher all
//! agree on what a port can speak.

/// One protocol a port can be configured to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// Catalog name, as shown in port settings.
    pub name: &'static str,
    /// Registered framer the adapter should instantiate.
    pub framer: &'static str,
    /// Registered filter applied after framing, if the protocol has a
    /// conventional one.
    pub filter: Option<&'static str>,
    /// Human-readable description for settings UIs.
    pub description: &'static str,
}

impl ProtocolInfo {
    /// Render the adapter command-line options that select this
    /// protocol for the named port.
    pub fn adapter_opts(&self, port_name: &str) -> String {
        let mut opts = format!("--name {port_name} --framer-in {}", self.framer);
        if let Some(filter) = self.filter {
            opts.push_str(" --filter-in ");
            opts.push_str(filter);
        }
        opts
    }
}

const CATALOG: &[ProtocolInfo] = &[
    ProtocolInfo {
        name: "sbp",
        framer: "sbp",
        filter: Some("sbp-allowlist"),
        description: "Swift Binary Protocol navigation stream",
    },
    ProtocolInfo {
        name: "nmea",
        framer: "nmea",
        filter: None,
        description: "NMEA 0183 sentences",
    },
    ProtocolInfo {
        name: "anpp",
        framer: "anpp",
        filter: None,
        description: "Advanced Navigation packet protocol",
    },
    ProtocolInfo {
        name: "j1939",
        framer: "j1939",
        filter: None,
        description: "J1939 CAN capture records",
    },
    ProtocolInfo {
        name: "stats",
        framer: "stats",
        filter: None,
        description: "Coprocessor rpmsg stats reports",
    },
    ProtocolInfo {
        name: "protobuf",
        framer: "protobuf",
        filter: None,
        description: "Varint length-delimited messages",
    },
    ProtocolInfo {
        name: "bytes",
        framer: "bytes",
        filter: None,
        description: "Raw byte passthrough",
    },
];

/// Every protocol the device knows how to frame.
pub fn catalog() -> &'static [ProtocolInfo] {
    CATALOG
}

/// Find a protocol by its catalog name.
pub fn lookup(name: &str) -> Option<&'static ProtocolInfo> {
    CATALOG.iter().find(|info| info.name == name)
}
