use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;

use crate::DEFAULT_SERVICE_TTL;

/// One reachable instance of a named service.
///
/// Returned by lookups, announced by keep-alive and used as failover
/// entries. The payload is opaque to the client; servers commonly put a
/// JSON document there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(default, deserialize_with = "payload_as_text")]
    pub payload: String,
}

impl ServiceAddress {
    pub fn new(
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            ttl: DEFAULT_SERVICE_TTL,
            payload: String::new(),
        }
    }

    pub fn with_ttl(
        mut self,
        ttl: u32,
    ) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_payload(
        mut self,
        payload: impl Into<String>,
    ) -> Self {
        self.payload = payload.into();
        self
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn default_ttl() -> u32 {
    DEFAULT_SERVICE_TTL
}

/// Servers differ on whether `payload` is a string or an inline JSON value.
/// Non-string values are kept as their JSON text.
fn payload_as_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where D: Deserializer<'de> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
