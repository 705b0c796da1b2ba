//! The discovery capability and its static, list-holding variant.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::DiscoveryError;
use crate::select::SelectMode;

static SEED_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Highest starting cursor, exclusive.
const MAX_START_CURSOR: usize = (i32::MAX - 1) as usize;

/// A selectable list of server addresses.
///
/// Implementations are shared between tasks; every method takes `&self`.
pub trait Discovery: Send + Sync + 'static {
    /// Pull a fresh list from wherever this discovery gets it.
    fn refresh(&self) -> impl Future<Output = Result<(), DiscoveryError>> + Send;

    /// Replace the held list wholesale.
    fn update(&self, servers: Vec<String>);

    /// Pick one server.
    fn get(&self, mode: SelectMode) -> Result<String, DiscoveryError>;

    /// Copy of the held list.
    fn get_all(&self) -> Vec<String>;
}

struct State {
    servers: Vec<String>,
    cursor: usize,
    rng: StdRng,
}

/// Discovery over a list set directly by the caller.
///
/// ## Example
///
/// ```rust
/// use beacon_discovery::{Discovery, SelectMode, StaticDiscovery};
///
/// let discovery = StaticDiscovery::new(vec!["tcp@10.0.0.1:9000".to_string()]);
/// assert_eq!(discovery.get(SelectMode::Random).unwrap(), "tcp@10.0.0.1:9000");
/// ```
pub struct StaticDiscovery {
    state: Mutex<State>,
}

impl StaticDiscovery {
    /// Create a discovery holding `servers`.
    ///
    /// The random source is seeded from the wall clock and the round-robin
    /// cursor starts at a random position, so instances created together do
    /// not all begin with the same server.
    #[must_use]
    pub fn new(servers: Vec<String>) -> Self {
        Self::with_seed(servers, clock_seed())
    }

    /// Create a discovery whose random source is seeded with `seed`.
    #[must_use]
    pub fn with_seed(servers: Vec<String>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let cursor = rng.random_range(0..MAX_START_CURSOR);
        Self {
            state: Mutex::new(State {
                servers,
                cursor,
                rng,
            }),
        }
    }

    /// Pick one server by mode name, as in `"random"` or `"round_robin"`.
    ///
    /// An empty list is reported before an unknown mode.
    pub fn get_by_name(&self, mode: &str) -> Result<String, DiscoveryError> {
        if self.state.lock().servers.is_empty() {
            return Err(DiscoveryError::NoServersAvailable);
        }
        self.get(mode.parse()?)
    }

    /// Number of held servers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().servers.len()
    }

    /// Check whether no servers are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().servers.is_empty()
    }
}

impl Default for StaticDiscovery {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl std::fmt::Debug for StaticDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("StaticDiscovery")
            .field("servers", &state.servers)
            .field("cursor", &state.cursor)
            .finish_non_exhaustive()
    }
}

impl Discovery for StaticDiscovery {
    async fn refresh(&self) -> Result<(), DiscoveryError> {
        Ok(())
    }

    fn update(&self, servers: Vec<String>) {
        let mut state = self.state.lock();
        tracing::debug!(count = servers.len(), "replacing server list");
        state.servers = servers;
    }

    fn get(&self, mode: SelectMode) -> Result<String, DiscoveryError> {
        let mut state = self.state.lock();
        let n = state.servers.len();
        if n == 0 {
            return Err(DiscoveryError::NoServersAvailable);
        }

        let index = match mode {
            SelectMode::Random => state.rng.random_range(0..n),
            SelectMode::RoundRobin => {
                // The list may have shrunk since the last call.
                let index = state.cursor % n;
                state.cursor = (index + 1) % n;
                index
            }
        };
        Ok(state.servers[index].clone())
    }

    fn get_all(&self) -> Vec<String> {
        self.state.lock().servers.clone()
    }
}

fn clock_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let counter = SEED_COUNTER.fetch_add(1, Ordering::Relaxed);
    nanos ^ counter.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn servers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn with_cursor(names: &[&str], cursor: usize) -> StaticDiscovery {
        let discovery = StaticDiscovery::new(servers(names));
        discovery.state.lock().cursor = cursor;
        discovery
    }

    #[test]
    fn test_round_robin_order() {
        let discovery = with_cursor(&["a", "b", "c"], 0);
        let picks: Vec<_> = (0..4)
            .map(|_| discovery.get(SelectMode::RoundRobin).unwrap())
            .collect();
        assert_eq!(picks, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_round_robin_survives_shrinking_list() {
        let discovery = with_cursor(&["a", "b", "c", "d"], 3);
        discovery.update(servers(&["x", "y"]));

        // 3 % 2 == 1
        assert_eq!(discovery.get(SelectMode::RoundRobin).unwrap(), "y");
        assert_eq!(discovery.get(SelectMode::RoundRobin).unwrap(), "x");
    }

    #[test]
    fn test_fresh_instances_start_apart() {
        let list = servers(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        let firsts: HashSet<_> = (0..16)
            .map(|_| {
                StaticDiscovery::new(list.clone())
                    .get(SelectMode::RoundRobin)
                    .unwrap()
            })
            .collect();
        assert!(firsts.len() > 1);
    }

    #[test]
    fn test_start_cursor_in_range() {
        for seed in 0..64 {
            let discovery = StaticDiscovery::with_seed(Vec::new(), seed);
            assert!(discovery.state.lock().cursor < MAX_START_CURSOR);
        }
    }

    #[test]
    fn test_seeded_instances_repeat() {
        let list = servers(&["a", "b", "c", "d"]);
        let first = StaticDiscovery::with_seed(list.clone(), 42);
        let second = StaticDiscovery::with_seed(list, 42);
        for _ in 0..10 {
            assert_eq!(
                first.get(SelectMode::Random).unwrap(),
                second.get(SelectMode::Random).unwrap()
            );
        }
    }

    #[test]
    fn test_random_single_server() {
        let discovery = StaticDiscovery::new(servers(&["only"]));
        for _ in 0..10 {
            assert_eq!(discovery.get(SelectMode::Random).unwrap(), "only");
        }
    }

    #[test]
    fn test_random_stays_in_list() {
        let list = servers(&["a", "b", "c"]);
        let discovery = StaticDiscovery::new(list.clone());
        for _ in 0..100 {
            assert!(list.contains(&discovery.get(SelectMode::Random).unwrap()));
        }
    }

    #[test]
    fn test_empty_list() {
        let discovery = StaticDiscovery::default();
        assert_eq!(
            discovery.get(SelectMode::Random),
            Err(DiscoveryError::NoServersAvailable)
        );
        assert_eq!(
            discovery.get(SelectMode::RoundRobin),
            Err(DiscoveryError::NoServersAvailable)
        );
        // Empty list wins over an unknown mode.
        assert_eq!(
            discovery.get_by_name("weighted"),
            Err(DiscoveryError::NoServersAvailable)
        );
    }

    #[test]
    fn test_unknown_mode_by_name() {
        let discovery = StaticDiscovery::new(servers(&["a"]));
        assert_eq!(
            discovery.get_by_name("weighted"),
            Err(DiscoveryError::UnsupportedSelectionMode("weighted".to_string()))
        );
        assert_eq!(discovery.get_by_name("round_robin").unwrap(), "a");
    }

    #[test]
    fn test_get_all_is_a_copy() {
        let discovery = StaticDiscovery::new(servers(&["a", "b"]));
        let mut all = discovery.get_all();
        all.push("c".to_string());
        assert_eq!(discovery.get_all(), servers(&["a", "b"]));
        assert_eq!(discovery.len(), 2);
    }

    #[tokio::test]
    async fn test_static_refresh_is_noop() {
        let discovery = StaticDiscovery::new(servers(&["a"]));
        discovery.refresh().await.unwrap();
        assert_eq!(discovery.get_all(), servers(&["a"]));
    }

    #[test]
    fn test_concurrent_round_robin() {
        let discovery = Arc::new(with_cursor(&["a", "b", "c"], 0));

        let picks: Vec<String> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let discovery = discovery.clone();
                    s.spawn(move || {
                        (0..30)
                            .map(|_| discovery.get(SelectMode::RoundRobin).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect()
        });

        // Every read-modify-write is serialized, so picks are spread evenly.
        for name in ["a", "b", "c"] {
            assert_eq!(picks.iter().filter(|p| *p == name).count(), 40);
        }
    }
}
