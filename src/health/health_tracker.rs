use std::collections::HashMap;

use parking_lot::RwLock;

use super::ServiceEvent;

/// Per-name healthy flags for every watched service.
///
/// A name is healthy iff its last reload returned at least one address.
/// The tracker only reports changes: a reload that leaves a name's health
/// and the aggregate unchanged yields no events.
#[derive(Debug, Default)]
pub struct HealthTracker {
    watched: RwLock<HashMap<String, bool>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newly tracked names start unhealthy; re-tracking keeps the flag.
    pub fn track(
        &self,
        name: &str,
    ) {
        self.watched.write().entry(name.to_string()).or_insert(false);
    }

    /// Stop tracking `name`. Removing the last unhealthy name is an
    /// all-online edge and yields `AllOnline`.
    pub fn untrack(
        &self,
        name: &str,
    ) -> Vec<ServiceEvent> {
        let mut watched = self.watched.write();
        let was_all_healthy = watched.values().all(|healthy| *healthy);
        if watched.remove(name).is_none() {
            return Vec::new();
        }

        if !was_all_healthy && watched.values().all(|healthy| *healthy) {
            vec![ServiceEvent::AllOnline]
        } else {
            Vec::new()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.watched.read().is_empty()
    }

    pub fn healthy(
        &self,
        name: &str,
    ) -> bool {
        self.watched.read().get(name).copied().unwrap_or(false)
    }

    pub fn all_healthy(&self) -> bool {
        self.watched.read().values().all(|healthy| *healthy)
    }

    /// Record the outcome of a reload of `name` and return the edges it caused,
    /// in dispatch order: the per-name edge first, then `AllOnline`.
    pub fn transition(
        &self,
        name: &str,
        has_addresses: bool,
    ) -> Vec<ServiceEvent> {
        let mut watched = self.watched.write();
        let was_all_healthy = watched.values().all(|healthy| *healthy);

        let Some(healthy) = watched.get_mut(name) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if !*healthy && has_addresses {
            *healthy = true;
            events.push(ServiceEvent::Online(name.to_string()));
        } else if *healthy && !has_addresses {
            *healthy = false;
            events.push(ServiceEvent::Offline(name.to_string()));
        }

        if !was_all_healthy && watched.values().all(|healthy| *healthy) {
            events.push(ServiceEvent::AllOnline);
        }
        events
    }
}
