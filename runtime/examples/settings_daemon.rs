//! Power-user example: settings owner serving peers over REP, no stats timer.
//!
//! ```bash
//! cargo run -p loran-runtime --example settings_daemon
//! ```

use loran_runtime::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    RuntimeBuilder::new()
        .settings_path("/tmp/loran-demo.ini")
        .disable_stats()
        .configure(|mut daemon| async move {
            {
                let settings = daemon.settings();
                let mut settings = settings.lock();
                settings.register("uart0", "mode", "sbp", SettingKind::Text)?;
                settings.register(
                    "uart0",
                    "enabled_sbp_messages",
                    "68,72,73,74",
                    SettingKind::Text,
                )?;
                settings.register("solution", "soln_freq", "10", SettingKind::Int)?;
            }
            daemon.serve_settings("@tcp://127.0.0.1:43011").await?;
            Ok(daemon)
        })
        .await
}
