//! # Beacon
//!
//! Service location and transport framing for RPC.
//!
//! Beacon provides:
//! - **Codec** - a header frame followed by a body frame over any byte
//!   stream, with rkyv or JSON encoding
//! - **Registry** - a TTL directory of server addresses, its HTTP control
//!   endpoint, and a heartbeat that keeps a server listed
//! - **Discovery** - a client-side server list with random or round-robin
//!   selection, static or refreshed from a registry
//!
//! ## Quick Start
//!
//! ```rust
//! use beacon::{Discovery, SelectMode, StaticDiscovery};
//!
//! let discovery = StaticDiscovery::new(vec![
//!     "tcp@10.0.0.1:9000".to_string(),
//!     "tcp@10.0.0.2:9000".to_string(),
//! ]);
//! let server = discovery.get(SelectMode::RoundRobin).unwrap();
//! assert!(discovery.get_all().contains(&server));
//! ```
//!
//! ## Architecture
//!
//! - [`beacon-core`] - Shared types: `Header`, `Message`, errors, `TaskHandle`
//! - [`beacon-codec`] - Length-prefixed framing and the `Codec` trait
//! - [`beacon-registry`] - `Registry`, HTTP control endpoint, `Heartbeat`
//! - [`beacon-discovery`] - `Discovery`, `StaticDiscovery`, `RegistryDiscovery`

// Re-export core types
pub use beacon_core::{
    CodecError, Header, Message, Sequence, Shutdown, TaskHandle, TransportError,
};

// Re-export codec
pub use beacon_codec::{AlignedVec, Codec, Encoding, FrameCodec, FramedCodec, Json, Rkyv};

// Re-export registry
pub use beacon_registry::{
    Announcer, Heartbeat, HeartbeatConfig, HeartbeatExit, Registry, RegistryClient,
    RegistryClientConfig, RegistryConfig, RegistryError, RetryConfig, http,
};

// Re-export discovery
pub use beacon_discovery::{
    Discovery, DiscoveryError, RegistryDiscovery, RegistryDiscoveryConfig, SelectMode,
    StaticDiscovery,
};

// Re-export rkyv for defining body types
pub use rkyv::{Archive, Deserialize, Serialize};

/// Prelude module for convenient imports.
///
/// ```rust
/// use beacon::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Archive, Codec, Deserialize, Discovery, FramedCodec, Header, Heartbeat, HeartbeatConfig,
        Message, Registry, RegistryClient, RegistryDiscovery, SelectMode, Serialize,
        StaticDiscovery,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
