use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Map;
use serde_json::Value;

use super::GlobalVersion;
use crate::Error;
use crate::Result;
use crate::UNFETCHED_VERSION;

#[derive(Debug, Clone, PartialEq)]
pub struct WatchedKey {
    pub key: String,
    pub version: i64,
    pub value: Value,
}

impl WatchedKey {
    fn unfetched(key: &str) -> Self {
        Self {
            key: key.to_string(),
            version: UNFETCHED_VERSION,
            value: Value::Object(Map::new()),
        }
    }
}

/// keep key value in memory
///
/// Same snapshot-swap model as [`ServiceCache`](crate::ServiceCache),
/// without failovers.
#[derive(Debug)]
pub struct KvCache {
    global_version: GlobalVersion,
    entries: DashMap<String, Arc<WatchedKey>>,
}

impl Default for KvCache {
    fn default() -> Self {
        Self::new()
    }
}

impl KvCache {
    pub fn new() -> Self {
        Self {
            global_version: GlobalVersion::new(),
            entries: DashMap::new(),
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

    pub fn watch(
        &self,
        key: &str,
    ) {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(WatchedKey::unfetched(key)));
    }

    pub fn unwatch(
        &self,
        key: &str,
    ) {
        self.entries.remove(key);
    }

    pub fn is_watched(
        &self,
        key: &str,
    ) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn version(
        &self,
        key: &str,
    ) -> i64 {
        self.entries
            .get(key)
            .map(|e| e.version)
            .unwrap_or(UNFETCHED_VERSION)
    }

    pub fn replace(
        &self,
        key: &str,
        version: i64,
        value: Value,
    ) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            *entry = Arc::new(WatchedKey {
                key: key.to_string(),
                version,
                value,
            });
        }
    }

    /// Value of a watched key; `{}` until the first successful fetch
    pub fn get(
        &self,
        key: &str,
    ) -> Result<Value> {
        self.entries
            .get(key)
            .map(|e| e.value.clone())
            .ok_or_else(|| Error::no_provider(key))
    }
}
