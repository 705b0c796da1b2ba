//! Address-keyed directory of live servers.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use beacon_core::TaskHandle;
use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::RegistryError;

/// Default time-to-live for an entry that stops announcing.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default HTTP path of the control endpoint.
pub const DEFAULT_PATH: &str = "/_beacon_/registry";

/// Configuration for a registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long an entry stays alive without a fresh announce.
    /// Zero disables expiry.
    pub ttl: Duration,

    /// HTTP path the control endpoint is mounted on.
    pub path: String,

    /// Period of the active sweep, if any.
    ///
    /// Expiry happens lazily on query either way; the sweep only keeps a
    /// registry that nobody queries from growing without bound.
    pub sweep_interval: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            path: DEFAULT_PATH.to_string(),
            sweep_interval: None,
        }
    }
}

impl RegistryConfig {
    /// Create a new config with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Default::default()
        }
    }

    /// Set the control endpoint path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Enable the active sweep.
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Check the config before building a registry from it.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if !self.path.starts_with('/') {
            return Err(RegistryError::InvalidConfig(format!(
                "path must start with '/': {}",
                self.path
            )));
        }
        // Capture segments would turn the endpoint into a wildcard route.
        if self
            .path
            .split('/')
            .any(|segment| segment.starts_with([':', '*', '{']))
        {
            return Err(RegistryError::InvalidConfig(format!(
                "path must not contain capture segments: {}",
                self.path
            )));
        }
        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(RegistryError::InvalidConfig(
                "sweep interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// One registered server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEntry {
    /// Server address; the identity of the entry.
    pub address: String,

    /// Time of the most recent announce.
    pub last_seen: Instant,
}

impl ServerEntry {
    fn is_alive(&self, now: Instant, ttl: Duration) -> bool {
        if ttl.is_zero() {
            return true;
        }
        // A deadline past the clock's range never expires.
        self.last_seen
            .checked_add(ttl)
            .is_none_or(|deadline| deadline > now)
    }
}

/// A control-protocol request, independent of the transport carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    /// List alive servers.
    Query,

    /// Refresh one server's entry.
    Announce {
        /// The announcing server; `None` if the request carried none.
        address: Option<String>,
    },

    /// Any other verb.
    Unsupported(String),
}

impl ControlRequest {
    /// Map an HTTP method and the address metadata onto a request.
    #[must_use]
    pub fn from_method(method: &str, address: Option<String>) -> Self {
        match method {
            "GET" => Self::Query,
            "POST" => Self::Announce { address },
            other => Self::Unsupported(other.to_string()),
        }
    }
}

/// Successful result of a control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    /// Alive addresses, in no particular order.
    Servers(Vec<String>),

    /// The announce was recorded.
    Announced,
}

/// Directory of servers kept alive by heartbeats.
///
/// One lock guards the whole directory. Expired entries are removed
/// lazily by [`Registry::list_alive`], so an address that stops announcing
/// stays until the next query (or sweep) observes it.
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use beacon_registry::Registry;
///
/// let registry = Registry::new(Duration::from_secs(30));
/// registry.announce("tcp@10.0.0.1:9999");
/// registry.announce("tcp@10.0.0.1:9999");
///
/// assert_eq!(registry.list_alive(), vec!["tcp@10.0.0.1:9999".to_string()]);
/// ```
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    servers: Mutex<HashMap<String, ServerEntry>>,
}

impl Registry {
    /// Create a registry with the given TTL and default settings.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            config: RegistryConfig::new(ttl),
            servers: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry with full configuration.
    pub fn with_config(config: RegistryConfig) -> Result<Self, RegistryError> {
        config.validate()?;
        Ok(Self {
            config,
            servers: Mutex::new(HashMap::new()),
        })
    }

    /// Get the registry configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Time-to-live shared by all entries.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Record a heartbeat from `address`, creating its entry if needed.
    pub fn announce(&self, address: impl Into<String>) {
        let address = address.into();
        let mut servers = self.servers.lock();
        let now = Instant::now();

        match servers.entry(address) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().last_seen = now;
            }
            Entry::Vacant(entry) => {
                tracing::info!(address = %entry.key(), "server registered");
                let address = entry.key().clone();
                entry.insert(ServerEntry {
                    address,
                    last_seen: now,
                });
            }
        }
    }

    /// List alive addresses, evicting every expired entry on the way.
    pub fn list_alive(&self) -> Vec<String> {
        let ttl = self.config.ttl;
        let mut servers = self.servers.lock();
        let now = Instant::now();

        let mut alive = Vec::with_capacity(servers.len());
        servers.retain(|address, entry| {
            if entry.is_alive(now, ttl) {
                alive.push(address.clone());
                true
            } else {
                tracing::info!(address = %address, "server expired");
                false
            }
        });
        alive
    }

    /// Evict every expired entry, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let ttl = self.config.ttl;
        let mut servers = self.servers.lock();
        let now = Instant::now();

        let before = servers.len();
        servers.retain(|_, entry| entry.is_alive(now, ttl));
        before - servers.len()
    }

    /// Snapshot of every entry, expired or not. Does not evict.
    #[must_use]
    pub fn entries(&self) -> Vec<ServerEntry> {
        self.servers.lock().values().cloned().collect()
    }

    /// Number of entries currently held, including unobserved expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.servers.lock().len()
    }

    /// Check whether the directory holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.lock().is_empty()
    }

    /// Serve one control request.
    ///
    /// A rejected request never touches the directory.
    pub fn handle(&self, request: ControlRequest) -> Result<ControlResponse, RegistryError> {
        match request {
            ControlRequest::Query => Ok(ControlResponse::Servers(self.list_alive())),
            ControlRequest::Announce { address } => {
                let address = address
                    .filter(|address| !address.is_empty())
                    .ok_or(RegistryError::MissingAddress)?;
                if address.contains(',') {
                    return Err(RegistryError::InvalidAddress(address));
                }
                self.announce(address);
                Ok(ControlResponse::Announced)
            }
            ControlRequest::Unsupported(verb) => Err(RegistryError::MethodNotAllowed(verb)),
        }
    }

    /// Run [`Registry::sweep`] every `interval` until stopped.
    ///
    /// The task yields the total number of evicted entries.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
    ) -> Result<TaskHandle<usize>, RegistryError> {
        if interval.is_zero() {
            return Err(RegistryError::InvalidConfig(
                "sweep interval must be non-zero".to_string(),
            ));
        }

        let registry = Arc::clone(self);
        Ok(TaskHandle::spawn("registry-sweep", move |mut shutdown| async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut evicted = 0;

            loop {
                tokio::select! {
                    biased;
                    () = shutdown.requested() => return evicted,
                    _ = ticker.tick() => {}
                }
                let removed = registry.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "registry sweep evicted expired servers");
                }
                evicted += removed;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::time::advance;

    const TTL: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let registry = Registry::new(TTL);
        registry.announce("a");

        advance(TTL - Duration::from_millis(1)).await;
        assert_eq!(registry.list_alive(), vec!["a".to_string()]);

        advance(Duration::from_millis(2)).await;
        assert!(registry.list_alive().is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_exactly_at_ttl() {
        let registry = Registry::new(TTL);
        registry.announce("a");

        advance(TTL).await;
        assert!(registry.list_alive().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_announce_resets_clock() {
        let registry = Registry::new(TTL);
        registry.announce("a");

        advance(TTL.mul_f64(0.6)).await;
        registry.announce("a");

        advance(TTL.mul_f64(0.6)).await;
        assert_eq!(registry.list_alive(), vec!["a".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_never_expires() {
        let registry = Registry::new(Duration::ZERO);
        registry.announce("a");

        advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        assert_eq!(registry.list_alive(), vec!["a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_kept_until_observed() {
        let registry = Registry::new(TTL);
        registry.announce("stale");

        advance(TTL * 2).await;
        registry.announce("fresh");

        // Nothing has queried yet, so the stale entry is still held.
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list_alive(), vec!["fresh".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_without_query() {
        let registry = Registry::new(TTL);
        registry.announce("a");
        registry.announce("b");

        advance(TTL / 2).await;
        registry.announce("b");
        advance(TTL / 2).await;

        assert_eq!(registry.sweep(), 1);
        let addresses: Vec<_> = registry.entries().into_iter().map(|e| e.address).collect();
        assert_eq!(addresses, vec!["b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task() {
        let registry = Arc::new(Registry::new(TTL));
        registry.announce("a");
        registry.announce("b");

        let sweeper = registry.spawn_sweeper(Duration::from_secs(1)).unwrap();
        tokio::time::sleep(TTL + Duration::from_millis(1500)).await;

        assert!(registry.is_empty());
        assert_eq!(sweeper.stop().await, Some(2));
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let registry = Arc::new(Registry::new(TTL));
        assert!(matches!(
            registry.spawn_sweeper(Duration::ZERO),
            Err(RegistryError::InvalidConfig(_))
        ));

        let config = RegistryConfig::new(TTL).sweep_interval(Duration::ZERO);
        assert!(Registry::with_config(config).is_err());
    }

    #[test]
    fn test_config_path_validation() {
        assert!(Registry::with_config(RegistryConfig::default()).is_ok());
        assert!(Registry::with_config(RegistryConfig::default().path("registry")).is_err());
        assert!(Registry::with_config(RegistryConfig::default().path("/rpc/registry")).is_ok());
        for path in ["/:x", "/rpc/*rest", "/{id}/registry"] {
            assert!(matches!(
                Registry::with_config(RegistryConfig::default().path(path)),
                Err(RegistryError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_control_requests() {
        let registry = Registry::new(TTL);

        assert_eq!(
            registry.handle(ControlRequest::from_method("POST", Some("a".into()))),
            Ok(ControlResponse::Announced)
        );
        assert_eq!(
            registry.handle(ControlRequest::from_method("GET", None)),
            Ok(ControlResponse::Servers(vec!["a".to_string()]))
        );
        assert_eq!(
            registry.handle(ControlRequest::from_method("POST", None)),
            Err(RegistryError::MissingAddress)
        );
        assert_eq!(
            registry.handle(ControlRequest::from_method("POST", Some(String::new()))),
            Err(RegistryError::MissingAddress)
        );
        assert_eq!(
            registry.handle(ControlRequest::from_method("POST", Some("b,c".into()))),
            Err(RegistryError::InvalidAddress("b,c".to_string()))
        );
        assert_eq!(
            registry.handle(ControlRequest::from_method("DELETE", Some("a".into()))),
            Err(RegistryError::MethodNotAllowed("DELETE".to_string()))
        );

        // Rejected requests leave the directory untouched.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_announce() {
        const SAME: usize = 32;
        const DISTINCT: usize = 64;

        let registry = Registry::new(TTL);
        let start = Instant::now();

        std::thread::scope(|scope| {
            for _ in 0..SAME {
                scope.spawn(|| registry.announce("shared"));
            }
            for i in 0..DISTINCT {
                let registry = &registry;
                scope.spawn(move || registry.announce(format!("server-{i}")));
            }
        });

        let entries = registry.entries();
        assert_eq!(entries.len(), DISTINCT + 1);
        assert!(entries.iter().all(|entry| entry.last_seen >= start));

        let unique: HashSet<_> = registry.list_alive().into_iter().collect();
        assert_eq!(unique.len(), DISTINCT + 1);
        assert!(unique.contains("shared"));
    }
}
