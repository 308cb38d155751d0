//! Error types for fabric plugins

use thiserror::Error;

/// Error type for plugin operations
///
/// This is the standard error type used by all fabric plugins: framers,
/// frame filters, and frame sinks. Factories and registries report the
/// same categories so daemons can handle startup failures uniformly.
///
/// # Example
///
/// ```
/// use loran_core::PluginError;
///
/// fn build_allowlist(spec: &str) -> Result<(), PluginError> {
///     // Simulate a malformed option string
///     Err(PluginError::Init(format!("bad allowlist '{spec}'")))
/// }
///
/// match build_allowlist("68,nope") {
///     Ok(_) => println!("Configured!"),
///     Err(PluginError::Init(msg)) => println!("Startup failed: {}", msg),
///     Err(e) => println!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// Initialization failed
    ///
    /// Returned when a plugin factory fails to construct an instance.
    /// Examples: malformed option string, unsupported protocol variant.
    #[error("initialization failed: {0}")]
    Init(String),

    /// Duplicate registration
    ///
    /// Returned when a plugin is registered under a name that is
    /// already taken. Names identify factories, so collisions are
    /// rejected rather than silently replaced.
    #[error("plugin '{0}' is already registered")]
    DuplicateName(String),

    /// Unknown plugin
    ///
    /// Returned when instantiation is requested for a name nobody
    /// registered. Examples: typo in adapter options, protocol family
    /// compiled out of the build.
    #[error("no plugin registered under '{0}'")]
    UnknownPlugin(String),

    /// Send failed
    ///
    /// Returned when a sink fails to deliver frames to its destination.
    /// Examples: endpoint closed underneath the pipeline, transport gone.
    #[error("send failed: {0}")]
    Send(String),

    /// Shutdown error
    ///
    /// Returned when graceful shutdown fails.
    /// Examples: failed to flush pending frames, endpoint teardown error.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}
