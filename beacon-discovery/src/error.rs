//! Discovery error types.

use beacon_registry::RegistryError;

/// Errors from server selection and list refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    /// The held server list is empty.
    #[error("no available servers")]
    NoServersAvailable,

    /// Selection mode is not one this discovery understands.
    #[error("unsupported select mode: {0}")]
    UnsupportedSelectionMode(String),

    /// Refreshing from the registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
