// -
// Endpoint selection

/// Selection weight every endpoint starts with and returns to after a clean tick
pub const DEFAULT_ENDPOINT_WEIGHT: u32 = 1024;

/// Version of a name or key that has never been fetched
pub const UNFETCHED_VERSION: i64 = -1;

/// Default ttl (seconds) announced for a provided service
pub const DEFAULT_SERVICE_TTL: u32 = 30;

// -
// Remote API paths

pub(crate) const API_VERSION: &str = "/api/version";
pub(crate) const API_SERVICE_VERSION: &str = "/api/service/version";
pub(crate) const API_SERVICE_SET: &str = "/api/service/set";
pub(crate) const API_SERVICE_KEEP: &str = "/api/service/keep";
pub(crate) const API_SERVICE_CANCEL: &str = "/api/service/cancel";
pub(crate) const API_KV_VERSION: &str = "/api/kv/version";
pub(crate) const API_KV_GET: &str = "/api/kv/get";
pub(crate) const API_KV_SET: &str = "/api/kv/set";
