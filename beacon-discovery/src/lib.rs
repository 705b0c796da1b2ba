//! # beacon-discovery
//!
//! Client-side server discovery for the Beacon RPC crates.
//!
//! This crate provides:
//! - `Discovery` trait: refresh, update, get, get_all
//! - `StaticDiscovery` for a list set directly by the caller
//! - `RegistryDiscovery` for a list pulled from a `beacon-registry` endpoint
//! - `SelectMode` - random or round-robin selection

mod discovery;
mod error;
mod registry;
mod select;

pub use discovery::{Discovery, StaticDiscovery};
pub use error::DiscoveryError;
pub use registry::{RegistryDiscovery, RegistryDiscoveryConfig};
pub use select::SelectMode;
