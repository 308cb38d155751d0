//! Settings request service
//!
//! Serves the wire protocol in [`super::codec`] over a REP endpoint.
//! Every decoded request gets exactly one response; undecodable
//! requests get a malformed status so the client's REQ alternation
//! never wedges.

use super::codec::{self, Request, Response, Status};
use super::registry::SettingsRegistry;
use crate::endpoint::{Endpoint, Role};
use crate::error::{FabricError, Result};
use crate::reactor::{EventHandler, LoopCx, Reactor, Token};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// REP-side settings server
///
/// Shares the registry with the rest of the daemon through a mutex so
/// local components and remote clients see the same values.
pub struct SettingsService {
    registry: Arc<Mutex<SettingsRegistry>>,
    endpoint: Arc<Endpoint>,
}

impl SettingsService {
    /// Create a service over a REP endpoint
    pub fn new(registry: Arc<Mutex<SettingsRegistry>>, endpoint: Arc<Endpoint>) -> Result<Self> {
        if endpoint.role() != Role::Rep {
            return Err(FabricError::InvalidOperation {
                role: endpoint.role(),
                op: "settings service",
            });
        }
        Ok(Self { registry, endpoint })
    }

    /// Register the service on a reactor
    pub fn attach(self, reactor: &mut Reactor) -> Result<Token> {
        info!(address = %self.endpoint.address(), "Attaching settings service");
        let endpoint = Arc::clone(&self.endpoint);
        reactor.add_endpoint(endpoint, ServiceHandler { service: self })
    }

    /// Answer one request payload
    pub fn process(&self, payload: &[u8]) -> Response {
        match codec::decode_request(payload) {
            Ok(Request::Read { section, name }) => {
                if let Some(metrics) = crate::metrics::Metrics::get() {
                    metrics.settings_reads.fetch_add(1, Ordering::Relaxed);
                }
                let registry = self.registry.lock();
                match registry.get(&section, &name) {
                    Some(setting) => {
                        debug!(section, name, value = setting.value(), "Settings read");
                        Response::Value {
                            value: setting.value().to_string(),
                            section,
                            name,
                        }
                    }
                    None => {
                        debug!(section, name, "Read of unknown setting");
                        Response::Status(Status::UnknownSetting)
                    }
                }
            }
            Ok(Request::Write {
                section,
                name,
                value,
            }) => {
                if let Some(metrics) = crate::metrics::Metrics::get() {
                    metrics.settings_writes.fetch_add(1, Ordering::Relaxed);
                }
                let mut registry = self.registry.lock();
                match registry.set(&section, &name, &value) {
                    Ok(()) => Response::Status(Status::Ok),
                    Err(FabricError::UnknownSetting { .. }) => {
                        debug!(section, name, "Write to unknown setting");
                        Response::Status(Status::UnknownSetting)
                    }
                    Err(FabricError::InvalidValue { .. }) => {
                        debug!(section, name, value, "Write with invalid value");
                        Response::Status(Status::InvalidValue)
                    }
                    Err(error) => {
                        warn!(section, name, %error, "Settings write failed");
                        Response::Status(Status::Malformed)
                    }
                }
            }
            Err(error) => {
                debug!(%error, "Malformed settings request");
                Response::Status(Status::Malformed)
            }
        }
    }
}

struct ServiceHandler {
    service: SettingsService,
}

#[async_trait]
impl EventHandler for ServiceHandler {
    async fn handle(&mut self, cx: &mut LoopCx) -> Result<()> {
        loop {
            match self.service.endpoint.try_receive() {
                Ok(Some(request)) => {
                    let response = self.service.process(&request);
                    if let Err(error) = self
                        .service
                        .endpoint
                        .send(codec::encode_response(&response))
                    {
                        warn!(%error, "Failed to send settings response");
                    }
                }
                Ok(None) => break,
                Err(FabricError::Closed) => {
                    debug!("Settings endpoint closed, detaching service");
                    cx.remove(cx.token());
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
