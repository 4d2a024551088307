//! Captain Client Error Hierarchy
//!
//! Two families of failure exist:
//! - [`TransportError`]: anything that goes wrong while talking to a discovery endpoint. These are
//!   contained by the reconciliation loop and only degrade the endpoint's selection weight.
//! - [`Error`]: failures surfaced to application code, most notably [`Error::NoProvider`] from
//!   cache lookups.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote call failed (only surfaced by direct calls such as `update_kv`)
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No address or value is available for the requested name
    #[error("no service provided for name={name}")]
    NoProvider { name: String },

    /// Configuration sources could not be loaded or deserialized
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration was loaded but failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// `start()` was called on a client whose loop already ran
    #[error("Client already started")]
    AlreadyStarted,

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, timeout, or body errors raised by the HTTP client
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Endpoint answered with a non-2xx status
    #[error("Endpoint {endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    /// Response body was not the expected JSON document
    #[error("Malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn no_provider(name: impl Into<String>) -> Self {
        Error::NoProvider { name: name.into() }
    }
}
