//! Remote API of the discovery server.
//!
//! [`DiscoveryTransport`] is the seam between the reconciliation logic and
//! the wire; [`HttpTransport`] speaks the server's HTTP/JSON dialect.

mod http_transport;

pub use http_transport::*;


use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde_json::Value;

use crate::Endpoint;
use crate::ServiceAddress;
use crate::TransportError;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Server-wide change counters for services and keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GlobalVersions {
    #[serde(rename = "service.version")]
    pub services: i64,
    #[serde(rename = "kv.version")]
    pub kv: i64,
}

impl GlobalVersions {
    /// `version` query value sent with the dirty check
    pub(crate) fn query_value(&self) -> String {
        format!("{},{}", self.services, self.kv)
    }
}

/// Answer to the global dirty check.
///
/// Servers either report both counters or a single version with a dirty
/// flag computed against the `version` the client sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DirtyCheck {
    Versions(GlobalVersions),
    Flag { version: i64, dirty: bool },
}

impl DirtyCheck {
    /// Counters to cache after this check
    pub fn versions(&self) -> GlobalVersions {
        match *self {
            DirtyCheck::Versions(versions) => versions,
            DirtyCheck::Flag { version, .. } => GlobalVersions {
                services: version,
                kv: version,
            },
        }
    }

    /// Whether the service and kv rounds are due, relative to `cached`.
    ///
    /// A flag answer marks both rounds dirty. A cached counter that was
    /// invalidated locally always differs from the server's.
    pub fn changes(
        &self,
        cached: GlobalVersions,
    ) -> (bool, bool) {
        let remote = self.versions();
        let dirty = matches!(self, DirtyCheck::Flag { dirty: true, .. });
        (
            dirty || remote.services != cached.services,
            dirty || remote.kv != cached.kv,
        )
    }
}

impl From<GlobalVersions> for DirtyCheck {
    fn from(versions: GlobalVersions) -> Self {
        DirtyCheck::Versions(versions)
    }
}

/// Full address list of one service name at `version`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceSet {
    pub version: i64,
    #[serde(default)]
    pub services: Vec<ServiceAddress>,
}

/// Value of one settings key at `version`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KvEntry {
    pub version: i64,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionsResponse {
    pub(crate) versions: HashMap<String, i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KvResponse {
    pub(crate) kv: KvEntry,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DiscoveryTransport: Send + Sync + 'static {
    /// Global dirty check against the locally cached counters
    async fn global_versions(
        &self,
        endpoint: &Endpoint,
        cached: GlobalVersions,
    ) -> TransportResult<DirtyCheck>;

    async fn service_versions(
        &self,
        endpoint: &Endpoint,
        names: &[String],
    ) -> TransportResult<HashMap<String, i64>>;

    async fn kv_versions(
        &self,
        endpoint: &Endpoint,
        keys: &[String],
    ) -> TransportResult<HashMap<String, i64>>;

    async fn service_set(
        &self,
        endpoint: &Endpoint,
        name: &str,
    ) -> TransportResult<ServiceSet>;

    async fn kv(
        &self,
        endpoint: &Endpoint,
        key: &str,
    ) -> TransportResult<KvEntry>;

    async fn set_kv(
        &self,
        endpoint: &Endpoint,
        key: &str,
        value: &Value,
    ) -> TransportResult<()>;

    /// keep service alive in captain
    async fn keep_service(
        &self,
        endpoint: &Endpoint,
        name: &str,
        address: &ServiceAddress,
    ) -> TransportResult<()>;

    /// cancel service in captain
    async fn cancel_service(
        &self,
        endpoint: &Endpoint,
        name: &str,
        address: &ServiceAddress,
    ) -> TransportResult<()>;
}
