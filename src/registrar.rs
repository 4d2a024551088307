//! Services this process provides and their keep-alive/cancel calls.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::DiscoveryTransport;
use crate::Endpoint;
use crate::ServiceAddress;
use crate::TransportResult;

#[derive(Debug, Default)]
pub struct Registrar {
    provided: RwLock<BTreeMap<String, ServiceAddress>>,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register intent to provide `name`; last write wins.
    pub fn provide(
        &self,
        name: &str,
        address: ServiceAddress,
    ) {
        self.provided.write().insert(name.to_string(), address);
    }

    pub fn provided(&self) -> Vec<(String, ServiceAddress)> {
        self.provided
            .read()
            .iter()
            .map(|(name, address)| (name.clone(), address.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.provided.read().is_empty()
    }

    /// Announce every provided service. The first failure aborts the rest of
    /// this round and is returned to the caller.
    pub async fn keep_alive(
        &self,
        transport: &dyn DiscoveryTransport,
        endpoint: &Endpoint,
    ) -> TransportResult<()> {
        for (name, address) in self.provided() {
            debug!(%endpoint, %name, %address, "keep service");
            transport.keep_service(endpoint, &name, &address).await?;
        }
        Ok(())
    }

    /// Best-effort deregistration; failures are logged and swallowed.
    pub async fn cancel_all(
        &self,
        transport: &dyn DiscoveryTransport,
        endpoint: &Endpoint,
    ) {
        for (name, address) in self.provided() {
            match transport.cancel_service(endpoint, &name, &address).await {
                Ok(()) => info!(%endpoint, %name, %address, "service cancelled"),
                Err(e) => warn!(%endpoint, %name, %address, "cancel service failed: {:?}", e),
            }
        }
    }
}
