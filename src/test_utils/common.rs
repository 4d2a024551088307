use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::CaptainClient;
use crate::Endpoint;
use crate::MockDiscoveryTransport;
use crate::ServiceEvent;
use crate::TransportError;

pub(crate) const TEST_CHECK_INTERVAL: Duration = Duration::from_millis(100);
pub(crate) const TEST_KEEPALIVE: Duration = Duration::from_secs(10);

pub(crate) fn two_endpoints() -> Vec<Endpoint> {
    vec![Endpoint::new("localhost", 6789), Endpoint::new("localhost", 6790)]
}

/// Client wired to `transport` with fixed intervals and seeded selection
pub(crate) fn mock_client(
    transport: MockDiscoveryTransport,
    endpoints: Vec<Endpoint>,
) -> CaptainClient {
    CaptainClient::builder(endpoints)
        .transport(Arc::new(transport))
        .check_interval(TEST_CHECK_INTERVAL)
        .keepalive(TEST_KEEPALIVE)
        .seed(7)
        .build()
        .expect("build mock client")
}

pub(crate) type EventLog = Arc<Mutex<Vec<ServiceEvent>>>;

/// Register an observer that appends every event to the returned log
pub(crate) fn record_events(client: &CaptainClient) -> EventLog {
    let events = EventLog::default();
    let sink = events.clone();
    client.observe(move |_: &CaptainClient, event: &ServiceEvent| sink.lock().push(event.clone()));
    events
}

pub(crate) fn unavailable() -> TransportError {
    TransportError::Status {
        endpoint: "localhost:6789".to_string(),
        status: 503,
    }
}
