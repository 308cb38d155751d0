//! LORAN runtime - daemon composition layer
//!
//! Provides [`run()`] for zero-boilerplate daemon startup, and
//! [`RuntimeBuilder`] for daemons that need control over the settings
//! file, the stats timer, etc.
//!
//! # Quick start
//!
//! ```ignore
//! use loran_runtime::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     loran_runtime::run(|mut daemon| async move {
//!         let source = daemon
//!             .open_endpoint("uart0", ">ipc:///var/run/loran/uart0.pub", Role::Sub)
//!             .await?;
//!         let framer = daemon.plugins().framer("sbp")?;
//!         Pipeline::for_port("uart0", framer).attach(daemon.reactor_mut(), source)?;
//!         Ok(daemon)
//!     })
//!     .await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod prelude;

use loran_fabric::{
    Config, Endpoint, FileStore, LogFormat, LoopControl, LoopCx, Metrics, PluginRegistry, Reactor,
    Role, SettingsRegistry, SettingsService, Table, Token,
};
use parking_lot::Mutex;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Run a LORAN daemon with default settings.
///
/// Loads configuration from environment variables, initialises tracing and
/// metrics, loads the plugin registry and persisted settings, calls your
/// closure to wire endpoints and pipelines onto the reactor, then runs the
/// reactor with graceful shutdown.
///
/// # Example
///
/// ```ignore
/// loran_runtime::run(|mut daemon| async move {
///     let source = daemon
///         .open_endpoint("uart0", ">ipc:///var/run/loran/uart0.pub", Role::Sub)
///         .await?;
///     let sink = daemon
///         .open_endpoint("fabric", "@ipc:///var/run/loran/external.pub", Role::Pub)
///         .await?;
///     let framer = daemon.plugins().framer("sbp")?;
///     Pipeline::for_port("uart0", framer)
///         .sink(sink)
///         .attach(daemon.reactor_mut(), source)?;
///     Ok(daemon)
/// }).await
/// ```
pub async fn run<F, Fut>(configure: F) -> anyhow::Result<()>
where
    F: FnOnce(Daemon) -> Fut,
    Fut: Future<Output = anyhow::Result<Daemon>>,
{
    RuntimeBuilder::new().configure(configure).await
}

/// Power-user builder for controlling runtime behaviour.
///
/// Use this when you need to override the settings file location, change
/// the stats cadence, or silence the stats timer entirely.
///
/// # Example
///
/// ```ignore
/// RuntimeBuilder::new()
///     .settings_path("/persistent/test.ini")
///     .disable_stats()
///     .configure(|daemon| async move {
///         Ok(daemon)
///     })
///     .await
/// ```
pub struct RuntimeBuilder {
    settings_path: Option<PathBuf>,
    stats_interval: Option<Duration>,
    stats_enabled: bool,
}

impl RuntimeBuilder {
    /// Create a new builder with defaults from environment variables.
    pub fn new() -> Self {
        Self {
            settings_path: None,
            stats_interval: None,
            stats_enabled: true,
        }
    }

    /// Override the settings persistence file.
    ///
    /// Default: loaded from `LORAN_SETTINGS_PATH` env var, or
    /// `/persistent/config.ini`.
    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Override the interval between metrics snapshots in the log.
    ///
    /// Default: loaded from `LORAN_STATS_INTERVAL_MS` env var, or 10s.
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = Some(interval);
        self
    }

    /// Do not schedule the periodic metrics snapshot.
    ///
    /// Useful for short-lived tools where the cadence log is noise.
    pub fn disable_stats(mut self) -> Self {
        self.stats_enabled = false;
        self
    }

    /// Configure the daemon and run it to completion.
    ///
    /// This is the terminal method; it blocks until shutdown.
    pub async fn configure<F, Fut>(self, configure: F) -> anyhow::Result<()>
    where
        F: FnOnce(Daemon) -> Fut,
        Fut: Future<Output = anyhow::Result<Daemon>>,
    {
        // ── 1. Load config from env ──────────────────────────────
        let mut config = Config::from_env()?;
        if let Some(path) = self.settings_path {
            config.settings_path = path;
        }
        if let Some(interval) = self.stats_interval {
            config.stats_interval = interval;
        }

        // ── 2. Init tracing ──────────────────────────────────────
        init_tracing(&config);

        info!(
            settings_path = %config.settings_path.display(),
            pub_addr = %config.pub_addr,
            sub_addr = %config.sub_addr,
            "Starting LORAN daemon"
        );

        // ── 3. Init metrics ──────────────────────────────────────
        Metrics::init();

        // ── 4. Load plugins ──────────────────────────────────────
        let mut plugins = PluginRegistry::with_builtins();
        loran_protocols::register_builtin(&mut plugins)?;

        // ── 5. Load persisted settings ───────────────────────────
        let store = FileStore::load(&config.settings_path);
        let settings = Arc::new(Mutex::new(SettingsRegistry::with_store(store)));

        // ── 6. Build the reactor ─────────────────────────────────
        let mut reactor = Reactor::new();
        if self.stats_enabled {
            reactor.add_timer(config.stats_interval, |_cx: &mut LoopCx| {
                if let Some(metrics) = Metrics::get() {
                    metrics.log_snapshot();
                }
            })?;
        }

        // ── 7. User configures the daemon ────────────────────────
        let daemon = Daemon {
            config,
            plugins,
            settings,
            reactor,
            endpoints: Table::with_cleanup(|name, endpoint: Arc<Endpoint>| {
                debug!(name, "Closing endpoint");
                endpoint.close();
            }),
        };
        let mut daemon = configure(daemon).await?;

        // ── 8. Run until shutdown ────────────────────────────────
        let control = daemon.reactor.control();
        tokio::spawn(async move {
            shutdown_signal().await;
            control.stop();
        });

        let outcome = daemon.reactor.run().await;

        // ── 9. Shutdown ──────────────────────────────────────────
        daemon.reactor.detach_all();
        daemon.reactor.close()?;

        {
            let settings = daemon.settings.lock();
            if !settings.is_empty() {
                if let Err(e) = FileStore::save(&daemon.config.settings_path, &settings) {
                    warn!(
                        error = %e,
                        path = %daemon.config.settings_path.display(),
                        "Failed to persist settings"
                    );
                }
            }
        }
        drop(daemon);

        outcome?;
        info!("LORAN daemon shutdown complete");

        Ok(())
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One daemon's composition: config, plugins, settings, reactor, and the
/// endpoints it has opened.
///
/// The runtime hands a `Daemon` to your configure closure; wire what you
/// need and hand it back. Endpoints opened through [`Daemon::open_endpoint`]
/// are tracked by name and closed when the daemon shuts down.
pub struct Daemon {
    config: Config,
    plugins: PluginRegistry,
    settings: Arc<Mutex<SettingsRegistry>>,
    reactor: Reactor,
    endpoints: Table<Arc<Endpoint>>,
}

impl Daemon {
    /// Configuration loaded at startup.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Framer and filter registry, builtins plus protocol plugins.
    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Mutable registry access for daemon-specific plugins.
    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    /// Shared handle to the settings registry.
    ///
    /// Lock it to register or read settings; the settings service and any
    /// change callbacks see the same values.
    pub fn settings(&self) -> Arc<Mutex<SettingsRegistry>> {
        Arc::clone(&self.settings)
    }

    /// The reactor, for attaching pipelines, sources, and timers.
    pub fn reactor_mut(&mut self) -> &mut Reactor {
        &mut self.reactor
    }

    /// Cloneable handle for stopping the daemon from handlers or tasks.
    pub fn control(&self) -> LoopControl {
        self.reactor.control()
    }

    /// Open an endpoint and track it under `name`.
    ///
    /// Tracked endpoints are closed when the daemon shuts down. Re-opening
    /// a name closes the endpoint it replaces.
    pub async fn open_endpoint(
        &mut self,
        name: &str,
        address: &str,
        role: Role,
    ) -> anyhow::Result<Arc<Endpoint>> {
        let endpoint = Endpoint::open(address, role).await?;
        self.endpoints.put(name, Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Look up a tracked endpoint by name.
    pub fn endpoint(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.get(name).cloned()
    }

    /// Serve this daemon's settings registry over a REP endpoint.
    ///
    /// Peers read and write settings with the request codec in
    /// `loran_fabric::settings`. The endpoint is tracked under the name
    /// `settings`.
    pub async fn serve_settings(&mut self, address: &str) -> anyhow::Result<Token> {
        let endpoint = Endpoint::open(address, Role::Rep).await?;
        let service = SettingsService::new(Arc::clone(&self.settings), Arc::clone(&endpoint))?;
        let token = service.attach(&mut self.reactor)?;
        self.endpoints.put("settings", endpoint);
        Ok(token)
    }
}

/// Initialise the tracing subscriber based on config.
fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
