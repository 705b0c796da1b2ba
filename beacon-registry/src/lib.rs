//! # beacon-registry
//!
//! A TTL-based directory of RPC server addresses.
//!
//! This crate provides:
//! - `Registry` - in-memory address table with lazy eviction
//! - `http` - the registry's HTTP control endpoint (GET = query, POST = announce)
//! - `RegistryClient` - the matching HTTP client
//! - `Heartbeat` - keeps one address fresh by announcing it periodically
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use beacon_registry::{http, Registry, DEFAULT_TTL};
//!
//! let registry = Arc::new(Registry::new(DEFAULT_TTL));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:9999").await?;
//! http::serve(listener, registry).await?;
//! ```

mod client;
mod error;
mod heartbeat;
pub mod http;
mod registry;
mod retry;

pub use client::{RegistryClient, RegistryClientConfig, parse_servers};
pub use error::RegistryError;
pub use heartbeat::{Announcer, Heartbeat, HeartbeatConfig, HeartbeatExit, default_interval};
pub use registry::{
    ControlRequest, ControlResponse, DEFAULT_PATH, DEFAULT_TTL, Registry, RegistryConfig,
    ServerEntry,
};
pub use retry::RetryConfig;
