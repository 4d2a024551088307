use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::CaptainClient;
use super::ClientInner;
use super::LoopState;
use crate::ClientConfig;
use crate::DiscoveryTransport;
use crate::Endpoint;
use crate::EndpointSelector;
use crate::HealthTracker;
use crate::HttpTransport;
use crate::KvCache;
use crate::ObserverBus;
use crate::Registrar;
use crate::Result;
use crate::ServiceCache;

pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn DiscoveryTransport>>,
    seed: Option<u64>,
}

impl ClientBuilder {
    /// Create a new builder with default config and specified endpoints
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            config: ClientConfig {
                endpoints,
                ..ClientConfig::default()
            },
            transport: None,
            seed: None,
        }
    }

    /// Set check interval for watched services (default: 1s)
    pub fn check_interval(
        mut self,
        interval: Duration,
    ) -> Self {
        self.config.check_interval_ms = saturating_millis(interval);
        self
    }

    /// Set keepalive interval for provided services (default: 10s)
    ///
    /// Kept in whole seconds; a partial second rounds up.
    pub fn keepalive(
        mut self,
        interval: Duration,
    ) -> Self {
        self.config.keepalive_interval_secs = interval
            .as_secs()
            .saturating_add(u64::from(interval.subsec_nanos() > 0));
        self
    }

    /// Set request timeout (default: 3s)
    pub fn request_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.request_timeout_ms = saturating_millis(timeout);
        self
    }

    /// Set connection timeout (default: 1s)
    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.connect_timeout_ms = saturating_millis(timeout);
        self
    }

    /// Completely replaces the configuration, including the endpoint list
    /// passed to [`new`](ClientBuilder::new).
    ///
    /// Watch, watch_kv, failover and provide entries of `config` are applied
    /// to the built client.
    pub fn set_config(
        mut self,
        config: ClientConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Replace the HTTP transport, e.g. with an in-process fake
    pub fn transport(
        mut self,
        transport: Arc<dyn DiscoveryTransport>,
    ) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Seed endpoint selection for reproducible draws
    pub fn seed(
        mut self,
        seed: u64,
    ) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the client with current configuration
    pub fn build(self) -> Result<CaptainClient> {
        let config = self.config;
        config.validate()?;

        let selector = match self.seed {
            Some(seed) => EndpointSelector::with_seed(config.endpoints.clone(), seed)?,
            None => EndpointSelector::new(config.endpoints.clone())?,
        };

        let transport: Arc<dyn DiscoveryTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(config.connect_timeout(), config.request_timeout())?),
        };

        let client = CaptainClient {
            inner: Arc::new(ClientInner {
                config: config.clone(),
                transport,
                selector: Mutex::new(selector),
                services: ServiceCache::new(),
                kvs: KvCache::new(),
                health: HealthTracker::new(),
                observers: ObserverBus::new(),
                registrar: Registrar::new(),
                state: Mutex::new(LoopState::Idle),
                shutdown: CancellationToken::new(),
                worker: Mutex::new(None),
            }),
        };

        client.watch(&config.watch).watch_kv(&config.watch_kv);
        for (name, addresses) in &config.failover {
            client.failover(name, addresses.iter().cloned());
        }
        for (name, address) in &config.provide {
            client.provide(name, address.clone());
        }
        Ok(client)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
