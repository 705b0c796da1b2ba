//! HTTP client for a registry's control endpoint.

use std::time::Duration;

use crate::error::RegistryError;
use crate::http::SERVERS_HEADER;

/// Configuration for the registry client.
#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// Full URL of the control endpoint.
    pub endpoint: String,

    /// Timeout for one registry request.
    pub timeout: Duration,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9999/_beacon_/registry".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl RegistryClientConfig {
    /// Create a new config with the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client speaking the registry control protocol over HTTP.
///
/// ## Example
///
/// ```rust,ignore
/// use beacon_registry::RegistryClient;
///
/// let client = RegistryClient::new("http://registry:9999/_beacon_/registry");
/// client.announce("tcp@10.0.0.1:9000").await?;
/// let servers = client.query().await?;
/// ```
#[derive(Debug, Clone)]
pub struct RegistryClient {
    config: RegistryClientConfig,
    http: reqwest::Client,
}

impl RegistryClient {
    /// Create a new registry client with the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_config(RegistryClientConfig::new(endpoint))
    }

    /// Create a client with full configuration.
    #[must_use]
    pub fn with_config(config: RegistryClientConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Create a client reusing an existing HTTP client.
    #[must_use]
    pub fn with_http_client(config: RegistryClientConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Get the registry endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Announce `address` to the registry.
    pub async fn announce(&self, address: &str) -> Result<(), RegistryError> {
        tracing::debug!(endpoint = %self.config.endpoint, address, "sending heartbeat");

        self.http
            .post(&self.config.endpoint)
            .header(SERVERS_HEADER, address)
            .timeout(self.config.timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Fetch the alive server list.
    pub async fn query(&self) -> Result<Vec<String>, RegistryError> {
        let response = self
            .http
            .get(&self.config.endpoint)
            .timeout(self.config.timeout)
            .send()
            .await?
            .error_for_status()?;

        let servers = response
            .headers()
            .get(SERVERS_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(parse_servers)
            .unwrap_or_default();

        tracing::debug!(endpoint = %self.config.endpoint, count = servers.len(), "queried registry");
        Ok(servers)
    }
}

/// Split a comma-joined server list, skipping empty items.
#[must_use]
pub fn parse_servers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|server| !server.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use tokio::net::TcpListener;

    use crate::registry::Registry;

    async fn spawn_registry(registry: Arc<Registry>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(crate::http::serve(listener, registry));
        addr
    }

    fn client(addr: SocketAddr) -> RegistryClient {
        let config = RegistryClientConfig::new(format!("http://{addr}/_beacon_/registry"))
            .timeout(Duration::from_secs(2));
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        RegistryClient::with_http_client(config, http)
    }

    #[test]
    fn test_parse_servers() {
        assert_eq!(parse_servers("a,b"), vec!["a", "b"]);
        assert_eq!(parse_servers(" a , ,b,"), vec!["a", "b"]);
        assert!(parse_servers("").is_empty());
    }

    #[test]
    fn test_client_config() {
        let config = RegistryClientConfig::new("http://registry:9999/_beacon_/registry")
            .timeout(Duration::from_secs(10));
        assert_eq!(config.endpoint, "http://registry:9999/_beacon_/registry");
        assert_eq!(config.timeout, Duration::from_secs(10));

        let client = RegistryClient::with_config(config);
        assert_eq!(client.endpoint(), "http://registry:9999/_beacon_/registry");
    }

    #[tokio::test]
    async fn test_announce_and_query() {
        let registry = Arc::new(Registry::new(Duration::from_secs(60)));
        let client = client(spawn_registry(registry.clone()).await);

        assert!(client.query().await.unwrap().is_empty());

        client.announce("tcp@10.0.0.1:9000").await.unwrap();
        client.announce("tcp@10.0.0.1:9000").await.unwrap();
        client.announce("tcp@10.0.0.2:9000").await.unwrap();

        let mut servers = client.query().await.unwrap();
        servers.sort();
        assert_eq!(servers, vec!["tcp@10.0.0.1:9000", "tcp@10.0.0.2:9000"]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_address_is_rejected() {
        let registry = Arc::new(Registry::new(Duration::from_secs(60)));
        let client = client(spawn_registry(registry.clone()).await);

        assert_eq!(client.announce("").await, Err(RegistryError::Status(400)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_registry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(addr);
        assert!(matches!(
            client.announce("tcp@10.0.0.1:9000").await,
            Err(RegistryError::Request(_))
        ));
        assert!(matches!(client.query().await, Err(RegistryError::Request(_))));
    }
}
