use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tracing::debug;

use crate::CaptainClient;

/// Edge-triggered notification delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// A watched service gained its first address
    Online(String),
    /// A watched service lost its last address
    Offline(String),
    /// Every watched service is online
    AllOnline,
    /// A watched key was reloaded
    KvUpdated(String),
}

impl fmt::Display for ServiceEvent {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ServiceEvent::Online(name) => write!(f, "online({name})"),
            ServiceEvent::Offline(name) => write!(f, "offline({name})"),
            ServiceEvent::AllOnline => write!(f, "all_online"),
            ServiceEvent::KvUpdated(key) => write!(f, "kv_update({key})"),
        }
    }
}

/// Application callback for service state changes.
///
/// Runs inline on the reconciliation task: keep it short or hand the work
/// off to another task.
pub trait ServiceObserver: Send + Sync + 'static {
    fn on_event(
        &self,
        client: &CaptainClient,
        event: &ServiceEvent,
    );
}

impl<F> ServiceObserver for F
where F: Fn(&CaptainClient, &ServiceEvent) + Send + Sync + 'static
{
    fn on_event(
        &self,
        client: &CaptainClient,
        event: &ServiceEvent,
    ) {
        self(client, event)
    }
}

/// Registered observers plus the one-shot all-online gate.
pub struct ObserverBus {
    observers: ArcSwap<Vec<Arc<dyn ServiceObserver>>>,
    all_online: watch::Sender<bool>,
}

impl Default for ObserverBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverBus {
    pub fn new() -> Self {
        let (all_online, _) = watch::channel(false);
        Self {
            observers: ArcSwap::from_pointee(Vec::new()),
            all_online,
        }
    }

    pub fn subscribe(
        &self,
        observer: Arc<dyn ServiceObserver>,
    ) {
        self.observers.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(observer.clone());
            next
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.load().len()
    }

    /// Deliver `event` to every observer in registration order.
    pub fn dispatch(
        &self,
        client: &CaptainClient,
        event: &ServiceEvent,
    ) {
        debug!(%event, "dispatch");
        for observer in self.observers.load().iter() {
            observer.on_event(client, event);
        }
        if *event == ServiceEvent::AllOnline {
            self.release();
        }
    }

    /// Open the all-online gate. Later calls are no-ops.
    pub fn release(&self) {
        self.all_online.send_if_modified(|released| {
            let changed = !*released;
            *released = true;
            changed
        });
    }

    pub fn is_released(&self) -> bool {
        *self.all_online.borrow()
    }

    /// Wait until the gate opens; returns immediately if it already has.
    pub async fn wait_released(&self) {
        let mut rx = self.all_online.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|released| *released).await;
    }
}
