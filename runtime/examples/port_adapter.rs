//! Minimal LORAN port adapter: frames one port's byte stream onto the fabric.
//!
//! ```bash
//! cargo run -p loran-runtime --example port_adapter
//! ```

use loran_runtime::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    loran_runtime::run(|mut daemon| async move {
        let sub_addr = daemon.config().sub_addr.clone();
        let pub_addr = daemon.config().pub_addr.clone();

        let source = daemon.open_endpoint("uart0", &sub_addr, Role::Sub).await?;
        let sink = daemon.open_endpoint("fabric", &pub_addr, Role::Pub).await?;

        let framer = daemon.plugins().framer("sbp")?;
        let filter = daemon.plugins().filter("sbp-allowlist")?;
        Pipeline::for_port("uart0", framer)
            .filter(filter)
            .sink(sink)
            .attach(daemon.reactor_mut(), source)?;

        Ok(daemon)
    })
    .await
}
