//! Discovery-server endpoints and the adaptive policy that picks one per
//! reconciliation cycle.

mod selector;

pub use selector::*;


use std::fmt;

use serde::Deserialize;

use crate::DEFAULT_ENDPOINT_WEIGHT;

/// One discovery-server instance.
///
/// `weight` is the selection probability mass; it is owned by
/// [`EndpointSelector`] and never drops below 1.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    #[serde(skip_deserializing, default = "default_weight")]
    pub(crate) weight: u32,
}

impl Endpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            weight: DEFAULT_ENDPOINT_WEIGHT,
        }
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// http url prefix
    pub fn url_root(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn default_weight() -> u32 {
    DEFAULT_ENDPOINT_WEIGHT
}
