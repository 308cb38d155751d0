//! Error types for the fabric

use crate::endpoint::Role;
use crate::reactor::Token;
use crate::settings::SettingKind;
use thiserror::Error;

// Re-export PluginError from loran-core
pub use loran_core::PluginError;

/// Result type alias for fabric operations
pub type Result<T> = std::result::Result<T, FabricError>;

/// Main error type for the fabric
#[derive(Error, Debug)]
pub enum FabricError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Address string did not parse
    #[error("invalid address '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: &'static str },

    /// Role string did not parse
    #[error("unknown role '{0}'")]
    InvalidRole(String),

    /// Operation not permitted for the endpoint's role or state
    #[error("{op} not permitted on {role} endpoint")]
    InvalidOperation { role: Role, op: &'static str },

    /// Endpoint has been closed
    #[error("endpoint closed")]
    Closed,

    /// No peer is connected yet
    #[error("no peer connected")]
    NotConnected,

    /// Endpoint is already registered with an event loop
    #[error("endpoint already registered with an event loop")]
    AlreadyRegistered,

    /// Transport-level IO error
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// No source or timer under this token
    #[error("no source or timer registered under token {0}")]
    UnknownToken(Token),

    /// Event loop cannot be closed while endpoints are registered
    #[error("{count} endpoints still registered")]
    SourcesRegistered { count: usize },

    /// Setting lookup failed
    #[error("unknown setting {section}.{name}")]
    UnknownSetting { section: String, name: String },

    /// Setting value failed type validation
    #[error("value '{value}' is not a valid {kind}")]
    InvalidValue { value: String, kind: SettingKind },

    /// Malformed settings wire message
    #[error("malformed settings message: {0}")]
    Codec(String),

    /// Plugin error
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_error_to_fabric_error() {
        let plugin_err = PluginError::Init("bad options".to_string());
        let fabric_err: FabricError = plugin_err.into();
        assert!(matches!(fabric_err, FabricError::Plugin(_)));
        assert_eq!(
            fabric_err.to_string(),
            "plugin error: initialization failed: bad options"
        );
    }

    #[test]
    fn test_invalid_operation_display() {
        let err = FabricError::InvalidOperation {
            role: Role::Pub,
            op: "receive",
        };
        assert_eq!(err.to_string(), "receive not permitted on pub endpoint");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: FabricError = io.into();
        assert!(matches!(err, FabricError::Transport(_)));
    }
}
