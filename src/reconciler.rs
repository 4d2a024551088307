//! Background reconciliation loop.
//!
//! Each tick commits to one endpoint, asks it whether anything changed,
//! reloads only the names/keys whose versions moved, turns the reloads into
//! health edges, and re-announces provided services when the keep-alive
//! interval has elapsed. Transport errors are contained per tick and only
//! lower the endpoint's selection weight.

use std::time::Duration;

use tokio::time::sleep;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::CaptainClient;
use crate::Endpoint;
use crate::GlobalVersions;
use crate::LoopState;
use crate::ServiceEvent;
use crate::TransportResult;

pub(crate) struct Reconciler {
    client: CaptainClient,
    shutdown: CancellationToken,
    check_interval: Duration,
    keepalive_interval: Duration,
    /// Last successful keep-alive round, shared by every provided service
    last_keep: Option<Instant>,
}

impl Reconciler {
    pub(crate) fn new(
        client: CaptainClient,
        shutdown: CancellationToken,
    ) -> Self {
        let config = client.config();
        let check_interval = config.check_interval();
        let keepalive_interval = config.keepalive_interval();
        Self {
            client,
            shutdown,
            check_interval,
            keepalive_interval,
            last_keep: None,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(interval = ?self.check_interval, "reconciliation loop started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.tick().await;

            tokio::select! {
                // Use biased to ensure branch order
                biased;
                _ = self.shutdown.cancelled() => {
                    warn!("shutdown signal received.");
                    break;
                }
                _ = sleep(self.check_interval) => {}
            }
        }
        self.client.inner.set_state(LoopState::Stopped);
        info!("reconciliation loop stopped");
    }

    /// One reconciliation cycle. Returns `true` when no transport error occurred.
    pub(crate) async fn tick(&mut self) -> bool {
        let endpoint = {
            let mut selector = self.client.inner.selector.lock();
            selector.reshuffle();
            selector.current().clone()
        };

        let mut clean = true;
        if let Err(e) = self.watch(&endpoint).await {
            error!(%endpoint, "watch versions failed: {:?}", e);
            clean = false;
        }
        if let Err(e) = self.keep(&endpoint).await {
            error!(%endpoint, "keep service failed: {:?}", e);
            clean = false;
        }

        {
            let mut selector = self.client.inner.selector.lock();
            if clean {
                selector.on_success();
            } else {
                selector.on_failure();
            }
        }
        clean
    }

    /// Dirty check, then the service and kv rounds it calls for.
    ///
    /// The returned global versions are cached immediately. A round that
    /// fails forgets its cached global version again so the next tick
    /// repeats it.
    async fn watch(
        &self,
        endpoint: &Endpoint,
    ) -> TransportResult<()> {
        let inner = &self.client.inner;
        let cached = GlobalVersions {
            services: inner.services.global_version(),
            kv: inner.kvs.global_version(),
        };
        let check = inner.transport.global_versions(endpoint, cached).await?;

        let (services_changed, kv_changed) = check.changes(cached);
        let remote = check.versions();
        inner.services.set_global_version(remote.services);
        inner.kvs.set_global_version(remote.kv);
        debug!(services_changed, kv_changed, ?check, "dirty check");

        let services = if services_changed {
            self.reconcile_services(endpoint).await
        } else {
            Ok(())
        };
        if services.is_err() {
            inner.services.invalidate_global_version();
        }

        let kvs = if kv_changed {
            self.reconcile_kvs(endpoint).await
        } else {
            Ok(())
        };
        if kvs.is_err() {
            inner.kvs.invalidate_global_version();
        }

        services.and(kvs)
    }

    async fn reconcile_services(
        &self,
        endpoint: &Endpoint,
    ) -> TransportResult<()> {
        let inner = &self.client.inner;
        let names = inner.services.names();
        if names.is_empty() {
            return Ok(());
        }

        let versions = inner.transport.service_versions(endpoint, &names).await?;
        for name in &names {
            let Some(&version) = versions.get(name) else {
                continue;
            };
            if version != inner.services.version(name) {
                self.reload_service(endpoint, name).await?;
            }
        }
        Ok(())
    }

    /// reload service information to services
    async fn reload_service(
        &self,
        endpoint: &Endpoint,
        name: &str,
    ) -> TransportResult<()> {
        let inner = &self.client.inner;
        let set = inner.transport.service_set(endpoint, name).await?;
        let online = !set.services.is_empty();
        debug!(name, version = set.version, count = set.services.len(), "reload service");

        inner.services.replace(name, set.version, set.services);
        for event in inner.health.transition(name, online) {
            self.client.dispatch(&event);
        }
        Ok(())
    }

    async fn reconcile_kvs(
        &self,
        endpoint: &Endpoint,
    ) -> TransportResult<()> {
        let inner = &self.client.inner;
        let keys = inner.kvs.keys();
        if keys.is_empty() {
            return Ok(());
        }

        let versions = inner.transport.kv_versions(endpoint, &keys).await?;
        for key in &keys {
            let Some(&version) = versions.get(key) else {
                continue;
            };
            if version != inner.kvs.version(key) {
                self.reload_kv(endpoint, key).await?;
            }
        }
        Ok(())
    }

    /// reload key value information
    async fn reload_kv(
        &self,
        endpoint: &Endpoint,
        key: &str,
    ) -> TransportResult<()> {
        let inner = &self.client.inner;
        let entry = inner.transport.kv(endpoint, key).await?;
        debug!(key, version = entry.version, "reload kv");

        inner.kvs.replace(key, entry.version, entry.value);
        self.client.dispatch(&ServiceEvent::KvUpdated(key.to_string()));
        Ok(())
    }

    /// Keep provided services alive once the keep-alive interval elapsed.
    ///
    /// The timestamp only moves on a fully successful round, so a failure is
    /// retried on the next tick.
    async fn keep(
        &mut self,
        endpoint: &Endpoint,
    ) -> TransportResult<()> {
        let inner = &self.client.inner;
        if inner.registrar.is_empty() {
            return Ok(());
        }

        let now = Instant::now();
        if let Some(last) = self.last_keep {
            if now.duration_since(last) <= self.keepalive_interval {
                return Ok(());
            }
        }

        inner.registrar.keep_alive(inner.transport.as_ref(), endpoint).await?;
        self.last_keep = Some(now);
        Ok(())
    }

    /// Load every watched key once before the loop starts.
    ///
    /// Failures are logged and left to the loop, which reloads keys whose
    /// version is still unfetched.
    pub(crate) async fn preload_kvs(&self) {
        let keys = self.client.inner.kvs.keys();
        if keys.is_empty() {
            return;
        }

        let endpoint = self.client.inner.current_endpoint();
        for key in keys {
            if let Err(e) = self.reload_kv(&endpoint, &key).await {
                warn!(%endpoint, %key, "initial kv load failed: {:?}", e);
                self.client.inner.selector.lock().on_failure();
                return;
            }
        }
    }
}
