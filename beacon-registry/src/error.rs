//! Registry error types.

/// Errors from the registry directory, its control surface, and the
/// client that talks to it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Announce arrived without an address.
    #[error("missing address")]
    MissingAddress,

    /// Announced address cannot survive the comma-joined server list.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Control verb is neither query nor announce.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The HTTP round trip to the registry failed.
    #[error("registry request failed: {0}")]
    Request(String),

    /// The registry answered with a non-success status.
    #[error("registry responded with status {0}")]
    Status(u16),

    /// Configuration rejected before starting.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::Status(status.as_u16());
        }
        Self::Request(e.to_string())
    }
}
