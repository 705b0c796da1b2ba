//! Discovery backed by a registry's query verb.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::TaskHandle;
use beacon_registry::{RegistryClient, RegistryClientConfig, RegistryError};
use tokio::time::MissedTickBehavior;

use crate::discovery::{Discovery, StaticDiscovery};
use crate::error::DiscoveryError;
use crate::select::SelectMode;

/// Configuration for registry-backed discovery.
#[derive(Debug, Clone)]
pub struct RegistryDiscoveryConfig {
    /// Full URL of the registry's control endpoint.
    pub endpoint: String,

    /// Timeout for one registry query.
    pub timeout: Duration,

    /// Interval used by [`RegistryDiscovery::spawn_refresher`].
    pub refresh_interval: Duration,
}

impl Default for RegistryDiscoveryConfig {
    fn default() -> Self {
        let client = RegistryClientConfig::default();
        Self {
            endpoint: client.endpoint,
            timeout: client.timeout,
            refresh_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryDiscoveryConfig {
    /// Create a new config with the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the query timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the background refresh interval.
    #[must_use]
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    fn client_config(&self) -> RegistryClientConfig {
        RegistryClientConfig::new(self.endpoint.clone()).timeout(self.timeout)
    }
}

/// Discovery whose list comes from a registry.
///
/// Selection is delegated to an inner [`StaticDiscovery`]; `refresh` queries
/// the registry and installs the result. Nothing is cached: every refresh is
/// one query.
///
/// ## Example
///
/// ```rust,ignore
/// use beacon_discovery::{Discovery, RegistryDiscovery, SelectMode};
///
/// let discovery = RegistryDiscovery::new("http://registry:9999/_beacon_/registry");
/// discovery.refresh().await?;
/// let server = discovery.get(SelectMode::RoundRobin)?;
/// ```
#[derive(Debug)]
pub struct RegistryDiscovery {
    servers: StaticDiscovery,
    client: RegistryClient,
    config: RegistryDiscoveryConfig,
}

impl RegistryDiscovery {
    /// Create a discovery querying `endpoint`, starting with an empty list.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_config(RegistryDiscoveryConfig::new(endpoint))
    }

    /// Create a discovery with full configuration.
    #[must_use]
    pub fn with_config(config: RegistryDiscoveryConfig) -> Self {
        let client = RegistryClient::with_config(config.client_config());
        Self::with_client(config, client)
    }

    /// Create a discovery querying through an existing client.
    #[must_use]
    pub fn with_client(config: RegistryDiscoveryConfig, client: RegistryClient) -> Self {
        Self {
            servers: StaticDiscovery::default(),
            client,
            config,
        }
    }

    /// Get the discovery configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryDiscoveryConfig {
        &self.config
    }

    /// Get the registry endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    /// Pick one server by mode name. See [`StaticDiscovery::get_by_name`].
    pub fn get_by_name(&self, mode: &str) -> Result<String, DiscoveryError> {
        self.servers.get_by_name(mode)
    }

    /// Refresh on the configured interval until the handle is stopped.
    ///
    /// The first refresh runs immediately. A failed refresh is logged and the
    /// previous list stays in place. The task yields the number of
    /// successful refreshes.
    pub fn spawn_refresher(self: &Arc<Self>) -> Result<TaskHandle<u64>, DiscoveryError> {
        let interval = self.config.refresh_interval;
        if interval.is_zero() {
            return Err(RegistryError::InvalidConfig(
                "refresh interval must be non-zero".to_string(),
            )
            .into());
        }

        let discovery = Arc::clone(self);
        Ok(TaskHandle::spawn("discovery-refresh", move |mut shutdown| async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut refreshed: u64 = 0;

            loop {
                tokio::select! {
                    biased;
                    () = shutdown.requested() => break,
                    _ = ticker.tick() => {}
                }

                let result = tokio::select! {
                    biased;
                    () = shutdown.requested() => break,
                    result = discovery.refresh() => result,
                };

                match result {
                    Ok(()) => refreshed += 1,
                    Err(e) => tracing::warn!(
                        endpoint = %discovery.endpoint(),
                        error = %e,
                        "discovery refresh failed, keeping previous servers"
                    ),
                }
            }

            refreshed
        }))
    }
}

impl Discovery for RegistryDiscovery {
    async fn refresh(&self) -> Result<(), DiscoveryError> {
        // No lock is held across the query; `update` takes it to install.
        let servers = self.client.query().await?;
        tracing::debug!(
            endpoint = %self.client.endpoint(),
            count = servers.len(),
            "refreshed servers from registry"
        );
        self.servers.update(servers);
        Ok(())
    }

    fn update(&self, servers: Vec<String>) {
        self.servers.update(servers);
    }

    fn get(&self, mode: SelectMode) -> Result<String, DiscoveryError> {
        self.servers.get(mode)
    }

    fn get_all(&self) -> Vec<String> {
        self.servers.get_all()
    }
}
