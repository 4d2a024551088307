use std::sync::Arc;

use dashmap::DashMap;
use rand::seq::SliceRandom;

use super::GlobalVersion;
use crate::Error;
use crate::Result;
use crate::ServiceAddress;
use crate::UNFETCHED_VERSION;

/// Snapshot of one watched service as last fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedService {
    pub name: String,
    pub version: i64,
    pub addresses: Vec<ServiceAddress>,
}

impl WatchedService {
    fn unfetched(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: UNFETCHED_VERSION,
            addresses: Vec::new(),
        }
    }
}

/// keep service information in memory
///
/// Entries are immutable `Arc` snapshots. A reload builds a new snapshot and
/// swaps it in under the map's shard lock, so readers observe either the old
/// `(version, addresses)` pair or the new one.
#[derive(Debug)]
pub struct ServiceCache {
    global_version: GlobalVersion,
    entries: DashMap<String, Arc<WatchedService>>,
    failovers: DashMap<String, Arc<Vec<ServiceAddress>>>,
}

impl Default for ServiceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceCache {
    pub fn new() -> Self {
        Self {
            global_version: GlobalVersion::new(),
            entries: DashMap::new(),
            failovers: DashMap::new(),
        }
    }

    pub fn global_version(&self) -> i64 {
        self.global_version.get()
    }

    pub fn set_global_version(
        &self,
        version: i64,
    ) {
        self.global_version.set(version);
    }

    pub fn invalidate_global_version(&self) {
        self.global_version.invalidate();
    }

    /// Start tracking `name`. An already watched name keeps its snapshot.
    pub fn watch(
        &self,
        name: &str,
    ) {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(WatchedService::unfetched(name)));
    }

    pub fn unwatch(
        &self,
        name: &str,
    ) {
        self.entries.remove(name);
    }

    pub fn is_watched(
        &self,
        name: &str,
    ) -> bool {
        self.entries.contains_key(name)
    }

    /// Watched names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Local version of `name`, `-1` when never fetched or not watched
    pub fn version(
        &self,
        name: &str,
    ) -> i64 {
        self.entries
            .get(name)
            .map(|e| e.version)
            .unwrap_or(UNFETCHED_VERSION)
    }

    pub fn snapshot(
        &self,
        name: &str,
    ) -> Option<Arc<WatchedService>> {
        self.entries.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Replace version and address list of `name` in one step.
    ///
    /// Names that are no longer watched are ignored.
    pub fn replace(
        &self,
        name: &str,
        version: i64,
        addresses: Vec<ServiceAddress>,
    ) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            *entry = Arc::new(WatchedService {
                name: name.to_string(),
                version,
                addresses,
            });
        }
    }

    /// set failover services
    pub fn set_failover(
        &self,
        name: &str,
        addresses: Vec<ServiceAddress>,
    ) {
        self.failovers.insert(name.to_string(), Arc::new(addresses));
    }

    pub fn failover(
        &self,
        name: &str,
    ) -> Option<Arc<Vec<ServiceAddress>>> {
        self.failovers.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Pick a live address for `name` uniformly at random.
    ///
    /// Falls back to the failover list only when the server reports no
    /// address at all.
    pub fn random_address(
        &self,
        name: &str,
    ) -> Result<ServiceAddress> {
        let mut rng = rand::thread_rng();

        if let Some(snapshot) = self.snapshot(name) {
            if let Some(address) = snapshot.addresses.choose(&mut rng) {
                return Ok(address.clone());
            }
        }

        self.failover(name)
            .and_then(|failovers| failovers.choose(&mut rng).cloned())
            .ok_or_else(|| Error::no_provider(name))
    }
}
