//! Application-facing client for the captain discovery server.
//!
//! - [`CaptainClient`] - cached lookups, registration and lifecycle
//! - [`ClientBuilder`] - configurable client construction
//!
//! # Basic Usage
//! ```no_run
//! use captain_client::{CaptainClient, Endpoint, ServiceAddress, ServiceEvent};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let client = CaptainClient::builder(vec![
//!         Endpoint::new("localhost", 6789),
//!         Endpoint::new("localhost", 6790),
//!     ])
//!     .build()
//!     .unwrap();
//!
//!     client
//!         .watch(["service2", "service3"])
//!         .provide("service1", ServiceAddress::new("localhost", 6101))
//!         .observe(|_: &CaptainClient, event: &ServiceEvent| println!("{event}"));
//!
//!     client.start().await.unwrap();
//!     client.wait_until_all_online().await;
//!
//!     let address = client.select("service2").unwrap();
//!     println!("service2 at {address}");
//!
//!     client.stop().await;
//! }
//! ```

mod builder;

pub use builder::*;


use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use crate::reconciler::Reconciler;
use crate::ClientConfig;
use crate::DiscoveryTransport;
use crate::Endpoint;
use crate::EndpointSelector;
use crate::Error;
use crate::HealthTracker;
use crate::KvCache;
use crate::ObserverBus;
use crate::Registrar;
use crate::Result;
use crate::ServiceAddress;
use crate::ServiceCache;
use crate::ServiceEvent;
use crate::ServiceObserver;

/// Lifecycle of the background reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Built, `start()` not called yet
    Idle,
    Running,
    /// `quit()` called, the in-flight tick has not finished yet
    Stopping,
    Stopped,
}

/// Handle to the discovery client.
///
/// Cheap to clone; all clones share the same caches, observers and
/// background loop. Created through [`builder()`](CaptainClient::builder)
/// or [`from_config()`](CaptainClient::from_config).
#[derive(Clone)]
pub struct CaptainClient {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn DiscoveryTransport>,
    pub(crate) selector: Mutex<EndpointSelector>,
    pub(crate) services: ServiceCache,
    pub(crate) kvs: KvCache,
    pub(crate) health: HealthTracker,
    pub(crate) observers: ObserverBus,
    pub(crate) registrar: Registrar,
    pub(crate) state: Mutex<LoopState>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) worker: Mutex<Option<JoinHandle<()>>>,
}

impl ClientInner {
    pub(crate) fn set_state(
        &self,
        state: LoopState,
    ) {
        *self.state.lock() = state;
    }

    /// Endpoint of the in-progress cycle
    pub(crate) fn current_endpoint(&self) -> Endpoint {
        self.selector.lock().current().clone()
    }
}

impl CaptainClient {
    /// Create a configured client builder
    ///
    /// # Arguments
    /// * `endpoints` - Interchangeable discovery-server endpoints
    pub fn builder(endpoints: Vec<Endpoint>) -> ClientBuilder {
        ClientBuilder::new(endpoints)
    }

    /// build from single endpoint
    pub fn origin(
        host: impl Into<String>,
        port: u16,
    ) -> Result<Self> {
        Self::builder(vec![Endpoint::new(host, port)]).build()
    }

    /// Build a client and apply the watch/provide/failover lists of `config`.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        Self::builder(config.endpoints.clone()).set_config(config).build()
    }

    /// Track service names. Safe to call while running; new names are
    /// fetched on the next tick.
    pub fn watch<I, S>(
        &self,
        names: I,
    ) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref();
            self.inner.services.watch(name);
            self.inner.health.track(name);
        }
        self.inner.services.invalidate_global_version();
        self
    }

    /// Stop tracking `name`. If it was the only service still offline,
    /// `AllOnline` is dispatched right away.
    pub fn unwatch(
        &self,
        name: &str,
    ) -> &Self {
        self.inner.services.unwatch(name);
        for event in self.inner.health.untrack(name) {
            self.dispatch(&event);
        }
        self
    }

    /// Track settings keys.
    pub fn watch_kv<I, S>(
        &self,
        keys: I,
    ) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            self.inner.kvs.watch(key.as_ref());
        }
        self.inner.kvs.invalidate_global_version();
        self
    }

    /// add backup services in case no dependent services provided
    pub fn failover<I>(
        &self,
        name: &str,
        addresses: I,
    ) -> &Self
    where
        I: IntoIterator<Item = ServiceAddress>,
    {
        self.inner
            .services
            .set_failover(name, addresses.into_iter().collect());
        self
    }

    /// register service to captain
    pub fn provide(
        &self,
        name: &str,
        address: ServiceAddress,
    ) -> &Self {
        self.inner.registrar.provide(name, address);
        self
    }

    pub fn observe(
        &self,
        observer: impl ServiceObserver,
    ) -> &Self {
        self.inner.observers.subscribe(Arc::new(observer));
        self
    }

    /// select a service for name
    pub fn select(
        &self,
        name: &str,
    ) -> Result<ServiceAddress> {
        self.inner.services.random_address(name)
    }

    /// get key value information from memory
    pub fn get_kv(
        &self,
        key: &str,
    ) -> Result<Value> {
        self.inner.kvs.get(key)
    }

    /// Write a settings value through the current endpoint.
    ///
    /// The local cache picks the new value up on a later tick, once the
    /// server bumps the key's version.
    pub async fn update_kv(
        &self,
        key: &str,
        value: &Value,
    ) -> Result<()> {
        let endpoint = self.inner.current_endpoint();
        self.inner.transport.set_kv(&endpoint, key, value).await?;
        Ok(())
    }

    pub fn healthy(
        &self,
        name: &str,
    ) -> bool {
        self.inner.health.healthy(name)
    }

    pub fn all_healthy(&self) -> bool {
        self.inner.health.all_healthy()
    }

    pub fn state(&self) -> LoopState {
        *self.inner.state.lock()
    }

    /// Snapshot of the configured endpoints and their current weights
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.inner.selector.lock().endpoints().to_vec()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Start the background reconciliation loop.
    ///
    /// With nothing to watch, `AllOnline` is dispatched right away, before
    /// any remote call. Watched keys are loaded once before the loop is
    /// spawned.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != LoopState::Idle {
                return Err(Error::AlreadyStarted);
            }
            *state = LoopState::Running;
        }

        if self.inner.health.is_empty() && !self.inner.observers.is_released() {
            info!("no watched services, all online");
            self.dispatch(&ServiceEvent::AllOnline);
        }

        let reconciler = Reconciler::new(self.clone(), self.inner.shutdown.clone());
        reconciler.preload_kvs().await;

        let handle = tokio::spawn(reconciler.run());
        *self.inner.worker.lock() = Some(handle);
        info!(
            endpoints = self.inner.config.endpoints.len(),
            observers = self.inner.observers.len(),
            "captain client started"
        );
        Ok(())
    }

    /// wait until all dependent services are ready
    ///
    /// Returns immediately if `AllOnline` already fired.
    pub async fn wait_until_all_online(&self) {
        self.inner.observers.wait_released().await;
    }

    /// Ask the loop to exit after its current tick.
    pub fn quit(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == LoopState::Running {
                *state = LoopState::Stopping;
            }
        }
        self.inner.shutdown.cancel();
    }

    /// stop captain client
    ///
    /// Stops the loop, waits for it, then cancels provided services
    /// (best-effort).
    pub async fn stop(&self) {
        self.quit();

        let worker = self.inner.worker.lock().take();
        if let Some(handle) = worker {
            if let Err(e) = handle.await {
                error!("reconciliation task failed: {:?}", e);
            }
        }

        let endpoint = self.inner.current_endpoint();
        self.inner
            .registrar
            .cancel_all(self.inner.transport.as_ref(), &endpoint)
            .await;

        self.inner.set_state(LoopState::Stopped);
        info!("captain client stopped");
    }

    /// Wait for SIGINT/SIGTERM (or Ctrl+C), then [`stop()`](CaptainClient::stop).
    pub async fn stop_on_signal(&self) -> Result<()> {
        wait_for_shutdown_signal().await?;
        self.stop().await;
        Ok(())
    }

    /// hang forever
    pub async fn hang(&self) {
        std::future::pending::<()>().await
    }

    pub(crate) fn dispatch(
        &self,
        event: &ServiceEvent,
    ) {
        self.inner.observers.dispatch(self, event);
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::signal;
    use tokio::signal::unix::SignalKind;

    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("failed to install SIGTERM handler: {e}")))?;
    tokio::select! {
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        result = tokio::signal::ctrl_c() => {
            result.map_err(|e| Error::Fatal(format!("failed to listen for Ctrl+C: {e}")))?;
            info!("Ctrl+C detected.");
        },
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| Error::Fatal(format!("failed to listen for Ctrl+C: {e}")))?;
    info!("Ctrl+C detected.");
    Ok(())
}
