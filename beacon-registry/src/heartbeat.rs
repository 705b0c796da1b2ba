//! Periodic announce of one server address to a registry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use beacon_core::{Shutdown, TaskHandle};
use tokio::time::MissedTickBehavior;

use crate::client::RegistryClient;
use crate::error::RegistryError;
use crate::registry::{DEFAULT_TTL, Registry};
use crate::retry::RetryConfig;

const ONE_MINUTE: Duration = Duration::from_secs(60);

/// Something that can refresh an address in a registry.
pub trait Announcer: Send + Sync + 'static {
    /// Announce `address` once.
    fn announce(&self, address: &str) -> impl Future<Output = Result<(), RegistryError>> + Send;
}

impl Announcer for RegistryClient {
    async fn announce(&self, address: &str) -> Result<(), RegistryError> {
        RegistryClient::announce(self, address).await
    }
}

impl Announcer for Registry {
    async fn announce(&self, address: &str) -> Result<(), RegistryError> {
        Registry::announce(self, address);
        Ok(())
    }
}

impl<A: Announcer> Announcer for Arc<A> {
    fn announce(&self, address: &str) -> impl Future<Output = Result<(), RegistryError>> + Send {
        A::announce(self, address)
    }
}

/// Heartbeat period for a registry with the given TTL.
///
/// One minute short of the TTL, so a single late send still lands inside
/// the window; half the TTL when it is a minute or less. A zero TTL never
/// expires, so the default TTL's period is used.
#[must_use]
pub fn default_interval(ttl: Duration) -> Duration {
    if ttl.is_zero() {
        return default_interval(DEFAULT_TTL);
    }
    if ttl > ONE_MINUTE {
        ttl - ONE_MINUTE
    } else {
        ttl / 2
    }
}

/// Configuration for a heartbeat.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Address announced on every beat.
    pub address: String,

    /// Period between beats. Must be shorter than the registry TTL.
    pub interval: Duration,

    /// Retry policy for a failed beat.
    pub retry: RetryConfig,
}

impl HeartbeatConfig {
    /// Heartbeat for a registry using the default TTL.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self::for_ttl(address, DEFAULT_TTL)
    }

    /// Heartbeat sized for a registry with the given TTL.
    #[must_use]
    pub fn for_ttl(address: impl Into<String>, ttl: Duration) -> Self {
        Self {
            address: address.into(),
            interval: default_interval(ttl),
            retry: RetryConfig::default(),
        }
    }

    /// Set the period between beats.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// How a heartbeat task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// Stopped through its handle.
    Stopped,

    /// The registry was unreachable after exhausting retries; no further
    /// beats are sent.
    Failed(RegistryError),
}

/// Keeps one address fresh in a registry.
///
/// The first beat is sent as soon as the task starts, then one per
/// interval. A beat that cannot reach the registry (after the configured
/// retries, none by default) ends the task for good; the address then drops
/// out of the registry once its TTL lapses. A reply with an error status is
/// logged and the heartbeat carries on.
///
/// ## Example
///
/// ```rust,ignore
/// use beacon_registry::{Heartbeat, HeartbeatConfig, RegistryClient};
///
/// let client = RegistryClient::new("http://registry:9999/_beacon_/registry");
/// let handle = Heartbeat::new(client, HeartbeatConfig::new("tcp@10.0.0.1:9000")).start()?;
/// // ...
/// handle.stop().await;
/// ```
pub struct Heartbeat<A> {
    announcer: A,
    config: HeartbeatConfig,
}

impl<A: Announcer> Heartbeat<A> {
    /// Create a heartbeat sending through `announcer`.
    #[must_use]
    pub fn new(announcer: A, config: HeartbeatConfig) -> Self {
        Self { announcer, config }
    }

    /// Get the heartbeat configuration.
    #[must_use]
    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Spawn the heartbeat loop on the current tokio runtime.
    pub fn start(self) -> Result<TaskHandle<HeartbeatExit>, RegistryError> {
        if self.config.interval.is_zero() {
            return Err(RegistryError::InvalidConfig(
                "heartbeat interval must be non-zero".to_string(),
            ));
        }
        self.config.retry.validate()?;

        tracing::info!(
            address = %self.config.address,
            interval = ?self.config.interval,
            "rpc server: starting heartbeat"
        );
        Ok(TaskHandle::spawn("heartbeat", move |shutdown| self.run(shutdown)))
    }

    async fn run(self, mut shutdown: Shutdown) -> HeartbeatExit {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.requested() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                () = shutdown.requested() => break,
                result = self.beat() => result,
            };

            if let Err(e) = result {
                tracing::warn!(
                    address = %self.config.address,
                    error = %e,
                    "rpc server: heartbeat failed, no further heartbeats will be sent"
                );
                return HeartbeatExit::Failed(e);
            }
        }

        tracing::info!(address = %self.config.address, "rpc server: heartbeat stopped");
        HeartbeatExit::Stopped
    }

    async fn beat(&self) -> Result<(), RegistryError> {
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            match self.announcer.announce(&self.config.address).await {
                Ok(()) => return Ok(()),
                // The registry answered; only an unreachable one ends the heartbeat.
                Err(e) if !matches!(e, RegistryError::Request(_)) => {
                    tracing::warn!(
                        address = %self.config.address,
                        error = %e,
                        "rpc server: registry rejected heartbeat"
                    );
                    return Ok(());
                }
                Err(e) if attempt < retry.max_retries => {
                    let delay = retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        address = %self.config.address,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "rpc server: heartbeat failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
