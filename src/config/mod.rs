//! Client configuration.
//!
//! Sources are merged in increasing priority:
//! 1. Default values (hardcoded)
//! 2. `config/captain.{toml,...}` if present
//! 3. File named by `CAPTAIN_CONFIG_PATH`
//! 4. Explicit path passed to [`ClientConfig::load`]
//! 5. `CAPTAIN__`-prefixed environment variables (highest priority)


use std::collections::HashMap;
use std::env;
use std::time::Duration;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::Endpoint;
use crate::Error;
use crate::Result;
use crate::ServiceAddress;

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Interchangeable discovery-server endpoints
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<Endpoint>,

    /// Reconciliation poll period in milliseconds
    /// Default: 1000
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Re-announce provided services at most this often (seconds)
    /// Default: 10
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,

    /// Maximum time to wait for a complete HTTP response
    /// Default: 3000
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum time to wait for establishing a TCP connection
    /// Default: 1000
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Service names to watch
    #[serde(default)]
    pub watch: Vec<String>,

    /// Settings keys to watch
    #[serde(default)]
    pub watch_kv: Vec<String>,

    /// Backup addresses per watched name, used while the server lists none
    #[serde(default)]
    pub failover: HashMap<String, Vec<ServiceAddress>>,

    /// Services this process provides
    #[serde(default)]
    pub provide: HashMap<String, ServiceAddress>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            check_interval_ms: default_check_interval_ms(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            watch: Vec::new(),
            watch_kv: Vec::new(),
            failover: HashMap::new(),
            provide: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Load and validate configuration from every source listed in the module docs.
    ///
    /// # Arguments
    /// * `path` - Optional file that must exist and overrides the other files
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::with_name("config/captain").required(false));

        if let Ok(env_path) = env::var("CAPTAIN_CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&env_path).required(true));
        }

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CAPTAIN")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::InvalidConfig("endpoints must contain at least one entry".into()));
        }
        if let Some(e) = self.endpoints.iter().find(|e| e.host.is_empty() || e.port == 0) {
            return Err(Error::InvalidConfig(format!("invalid endpoint {}", e)));
        }
        if self.check_interval_ms == 0 {
            return Err(Error::InvalidConfig("check_interval_ms must be greater than 0".into()));
        }
        if self.keepalive_interval_secs == 0 {
            return Err(Error::InvalidConfig("keepalive_interval_secs must be greater than 0".into()));
        }
        if self.request_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be greater than 0".into()));
        }
        for (name, address) in &self.provide {
            if address.port == 0 {
                return Err(Error::InvalidConfig(format!("provided service {} has port 0", name)));
            }
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_endpoints() -> Vec<Endpoint> {
    vec![Endpoint::new("localhost", 6789)]
}
fn default_check_interval_ms() -> u64 {
    1000
}
fn default_keepalive_interval_secs() -> u64 {
    10
}
fn default_request_timeout_ms() -> u64 {
    3000
}
fn default_connect_timeout_ms() -> u64 {
    1000
}
