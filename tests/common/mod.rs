//! In-process captain server speaking the HTTP/JSON dialect of the real one.
//!
//! Keep registers a provider, cancel removes it, and every change bumps both
//! the per-name and the global version, so clients observe it on their next
//! dirty check.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use captain_client::Endpoint;
use captain_client::ServiceAddress;
use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use tokio::time::sleep;
use tokio::time::timeout;
use warp::Filter;

pub const TEST_CHECK_INTERVAL: Duration = Duration::from_millis(20);
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct CaptainState {
    service_version: i64,
    kv_version: i64,
    services: BTreeMap<String, (i64, Vec<ServiceAddress>)>,
    kvs: BTreeMap<String, (i64, Value)>,
}

impl CaptainState {
    fn keep(
        &mut self,
        name: &str,
        address: ServiceAddress,
    ) {
        let (version, addresses) = self.services.entry(name.to_string()).or_default();
        if addresses.iter().any(|a| a.host == address.host && a.port == address.port) {
            return;
        }
        addresses.push(address);
        *version += 1;
        self.service_version += 1;
    }

    fn cancel(
        &mut self,
        name: &str,
        host: &str,
        port: u16,
    ) {
        if let Some((version, addresses)) = self.services.get_mut(name) {
            addresses.retain(|a| !(a.host == host && a.port == port));
            *version += 1;
            self.service_version += 1;
        }
    }

    fn set_kv(
        &mut self,
        key: &str,
        value: Value,
    ) {
        let (version, slot) = self.kvs.entry(key.to_string()).or_insert((0, Value::Null));
        *version += 1;
        *slot = value;
        self.kv_version += 1;
    }
}

#[derive(Clone)]
pub struct FakeCaptain {
    pub addr: SocketAddr,
    state: Arc<Mutex<CaptainState>>,
}

impl FakeCaptain {
    pub fn start() -> Self {
        let state = Arc::new(Mutex::new(CaptainState::default()));
        let addr = serve(state.clone());
        Self { addr, state }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.addr.port())
    }

    /// Register a provider as if it had sent a keep-alive
    pub fn publish(
        &self,
        name: &str,
        address: ServiceAddress,
    ) {
        self.state.lock().keep(name, address);
    }

    pub fn providers(
        &self,
        name: &str,
    ) -> Vec<ServiceAddress> {
        self.state
            .lock()
            .services
            .get(name)
            .map(|(_, addresses)| addresses.clone())
            .unwrap_or_default()
    }
}

fn names(
    pairs: Vec<(String, String)>,
    param: &str,
) -> Vec<String> {
    pairs.into_iter().filter(|(k, _)| k == param).map(|(_, v)| v).collect()
}

fn serve(state: Arc<Mutex<CaptainState>>) -> SocketAddr {
    let with_state = warp::any().map(move || state.clone());

    let version = warp::path!("api" / "version")
        .and(with_state.clone())
        .map(|state: Arc<Mutex<CaptainState>>| {
            let state = state.lock();
            warp::reply::json(&json!({
                "service.version": state.service_version,
                "kv.version": state.kv_version,
            }))
        });

    let service_version = warp::path!("api" / "service" / "version")
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_state.clone())
        .map(|pairs: Vec<(String, String)>, state: Arc<Mutex<CaptainState>>| {
            let state = state.lock();
            let versions: HashMap<String, i64> = names(pairs, "name")
                .into_iter()
                .map(|name| {
                    let version = state.services.get(&name).map(|(v, _)| *v).unwrap_or(0);
                    (name, version)
                })
                .collect();
            warp::reply::json(&json!({ "versions": versions }))
        });

    let service_set = warp::path!("api" / "service" / "set")
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state.clone())
        .map(|q: HashMap<String, String>, state: Arc<Mutex<CaptainState>>| {
            let state = state.lock();
            let name = q.get("name").cloned().unwrap_or_default();
            let (version, services) = state.services.get(&name).cloned().unwrap_or_default();
            warp::reply::json(&json!({ "version": version, "services": services }))
        });

    let keep = warp::path!("api" / "service" / "keep")
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state.clone())
        .map(|q: HashMap<String, String>, state: Arc<Mutex<CaptainState>>| {
            let port = q.get("port").and_then(|p| p.parse().ok()).unwrap_or(0);
            let ttl = q.get("ttl").and_then(|t| t.parse().ok()).unwrap_or(30);
            let address = ServiceAddress::new(q.get("host").cloned().unwrap_or_default(), port)
                .with_ttl(ttl)
                .with_payload(q.get("payload").cloned().unwrap_or_default());
            state
                .lock()
                .keep(q.get("name").map(String::as_str).unwrap_or_default(), address);
            warp::reply::json(&json!({ "ok": true }))
        });

    let cancel = warp::path!("api" / "service" / "cancel")
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state.clone())
        .map(|q: HashMap<String, String>, state: Arc<Mutex<CaptainState>>| {
            let port = q.get("port").and_then(|p| p.parse().ok()).unwrap_or(0);
            state.lock().cancel(
                q.get("name").map(String::as_str).unwrap_or_default(),
                q.get("host").map(String::as_str).unwrap_or_default(),
                port,
            );
            warp::reply::json(&json!({ "ok": true }))
        });

    let kv_version = warp::path!("api" / "kv" / "version")
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_state.clone())
        .map(|pairs: Vec<(String, String)>, state: Arc<Mutex<CaptainState>>| {
            let state = state.lock();
            let versions: HashMap<String, i64> = names(pairs, "key")
                .into_iter()
                .map(|key| {
                    let version = state.kvs.get(&key).map(|(v, _)| *v).unwrap_or(0);
                    (key, version)
                })
                .collect();
            warp::reply::json(&json!({ "versions": versions }))
        });

    let kv_get = warp::path!("api" / "kv" / "get")
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state.clone())
        .map(|q: HashMap<String, String>, state: Arc<Mutex<CaptainState>>| {
            let state = state.lock();
            let key = q.get("key").cloned().unwrap_or_default();
            let (version, value) = state.kvs.get(&key).cloned().unwrap_or((0, json!({})));
            warp::reply::json(&json!({ "kv": { "version": version, "value": value } }))
        });

    let kv_set = warp::path!("api" / "kv" / "set")
        .and(warp::post())
        .and(warp::body::form::<HashMap<String, String>>())
        .and(with_state)
        .map(|form: HashMap<String, String>, state: Arc<Mutex<CaptainState>>| {
            let raw = form.get("value").cloned().unwrap_or_default();
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            state
                .lock()
                .set_kv(form.get("key").map(String::as_str).unwrap_or_default(), value);
            warp::reply::json(&json!({ "ok": true }))
        });

    let routes = warp::get()
        .and(
            version
                .or(service_version)
                .or(service_set)
                .or(keep)
                .or(cancel)
                .or(kv_version)
                .or(kv_get),
        )
        .or(kv_set);

    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

/// Poll `condition` every few milliseconds until it holds or [`WAIT_TIMEOUT`] elapses.
pub async fn eventually<F>(condition: F) -> bool
where F: Fn() -> bool {
    timeout(WAIT_TIMEOUT, async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

/// Bound any client future by [`WAIT_TIMEOUT`]
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    timeout(WAIT_TIMEOUT, future)
        .await
        .expect("operation did not finish in time")
}
