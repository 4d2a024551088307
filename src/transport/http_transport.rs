use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use super::DiscoveryTransport;
use super::DirtyCheck;
use super::GlobalVersions;
use super::KvEntry;
use super::KvResponse;
use super::ServiceSet;
use super::TransportResult;
use super::VersionsResponse;
use crate::constants::*;
use crate::Endpoint;
use crate::Error;
use crate::Result;
use crate::ServiceAddress;
use crate::TransportError;

/// [`DiscoveryTransport`] over plain HTTP with JSON bodies.
///
/// One pooled `reqwest` client is shared by all endpoints; every call is a
/// single request/response with the configured timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Fatal(format!("failed to build http client: {e}")))?;
        Ok(Self { http })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        path: &str,
        query: &[(&str, String)],
    ) -> TransportResult<T> {
        let response = self.get(endpoint, path, query).await?;
        Self::decode(endpoint, response).await
    }

    async fn get(
        &self,
        endpoint: &Endpoint,
        path: &str,
        query: &[(&str, String)],
    ) -> TransportResult<Response> {
        let url = format!("{}{}", endpoint.url_root(), path);
        trace!(%url, ?query, "GET");
        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| http_error(endpoint, source))?;
        check_status(endpoint, response)
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &Endpoint,
        response: Response,
    ) -> TransportResult<T> {
        let body = response
            .bytes()
            .await
            .map_err(|source| http_error(endpoint, source))?;
        serde_json::from_slice(&body).map_err(|source| TransportError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

fn http_error(
    endpoint: &Endpoint,
    source: reqwest::Error,
) -> TransportError {
    TransportError::Http {
        endpoint: endpoint.to_string(),
        source,
    }
}

fn check_status(
    endpoint: &Endpoint,
    response: Response,
) -> TransportResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Repeated `param=value` pairs, one per item
fn repeated<'a>(
    param: &'a str,
    values: &[String],
) -> Vec<(&'a str, String)> {
    values.iter().map(|v| (param, v.clone())).collect()
}

#[async_trait]
impl DiscoveryTransport for HttpTransport {
    async fn global_versions(
        &self,
        endpoint: &Endpoint,
        cached: GlobalVersions,
    ) -> TransportResult<DirtyCheck> {
        self.get_json(endpoint, API_VERSION, &[("version", cached.query_value())])
            .await
    }

    async fn service_versions(
        &self,
        endpoint: &Endpoint,
        names: &[String],
    ) -> TransportResult<HashMap<String, i64>> {
        let response: VersionsResponse = self
            .get_json(endpoint, API_SERVICE_VERSION, &repeated("name", names))
            .await?;
        Ok(response.versions)
    }

    async fn kv_versions(
        &self,
        endpoint: &Endpoint,
        keys: &[String],
    ) -> TransportResult<HashMap<String, i64>> {
        let response: VersionsResponse = self
            .get_json(endpoint, API_KV_VERSION, &repeated("key", keys))
            .await?;
        Ok(response.versions)
    }

    async fn service_set(
        &self,
        endpoint: &Endpoint,
        name: &str,
    ) -> TransportResult<ServiceSet> {
        self.get_json(endpoint, API_SERVICE_SET, &[("name", name.to_string())])
            .await
    }

    async fn kv(
        &self,
        endpoint: &Endpoint,
        key: &str,
    ) -> TransportResult<KvEntry> {
        let response: KvResponse = self
            .get_json(endpoint, API_KV_GET, &[("key", key.to_string())])
            .await?;
        Ok(response.kv)
    }

    async fn set_kv(
        &self,
        endpoint: &Endpoint,
        key: &str,
        value: &Value,
    ) -> TransportResult<()> {
        let url = format!("{}{}", endpoint.url_root(), API_KV_SET);
        trace!(%url, key, "POST");
        let response = self
            .http
            .post(&url)
            .form(&[("key", key.to_string()), ("value", value.to_string())])
            .send()
            .await
            .map_err(|source| http_error(endpoint, source))?;
        check_status(endpoint, response).map(|_| ())
    }

    async fn keep_service(
        &self,
        endpoint: &Endpoint,
        name: &str,
        address: &ServiceAddress,
    ) -> TransportResult<()> {
        let query = [
            ("name", name.to_string()),
            ("host", address.host.clone()),
            ("port", address.port.to_string()),
            ("ttl", address.ttl.to_string()),
            ("payload", address.payload.clone()),
        ];
        self.get(endpoint, API_SERVICE_KEEP, &query).await.map(|_| ())
    }

    async fn cancel_service(
        &self,
        endpoint: &Endpoint,
        name: &str,
        address: &ServiceAddress,
    ) -> TransportResult<()> {
        let query = [
            ("name", name.to_string()),
            ("host", address.host.clone()),
            ("port", address.port.to_string()),
        ];
        self.get(endpoint, API_SERVICE_CANCEL, &query).await.map(|_| ())
    }
}
