//! RPC exchange types.
//!
//! One exchange on the wire is a [`Header`] followed by a body whose shape
//! is agreed between caller and callee. The header derives both rkyv and
//! serde so every codec encoding can carry it.

use std::sync::atomic::{AtomicU64, Ordering};

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Metadata identifying one RPC exchange.
#[derive(
    Archive,
    Serialize,
    Deserialize,
    SerdeSerialize,
    SerdeDeserialize,
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
)]
#[rkyv(derive(Debug))]
pub struct Header {
    /// Dotted `Service.Method` name.
    pub service_method: String,

    /// Caller-assigned sequence number, meaningful per connection.
    pub seq: u64,

    /// Error text; empty on success.
    pub error: String,
}

impl Header {
    /// Create a header for a successful exchange.
    #[must_use]
    pub fn new(service_method: impl Into<String>, seq: u64) -> Self {
        Self {
            service_method: service_method.into(),
            seq,
            error: String::new(),
        }
    }

    /// Attach an error message to this header.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }

    /// Check whether the exchange carries an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Split `Service.Method` on the last dot.
    ///
    /// Returns `None` when either half would be empty.
    #[must_use]
    pub fn split_service_method(&self) -> Option<(&str, &str)> {
        let (service, method) = self.service_method.rsplit_once('.')?;
        if service.is_empty() || method.is_empty() {
            return None;
        }
        Some((service, method))
    }
}

/// A header together with its decoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct Message<B> {
    /// Exchange metadata.
    pub header: Header,
    /// Service-defined payload.
    pub body: B,
}

impl<B> Message<B> {
    /// Pair a header with a body.
    #[must_use]
    pub fn new(header: Header, body: B) -> Self {
        Self { header, body }
    }
}

/// Caller-scoped source of sequence numbers.
///
/// Each caller (usually one per connection) owns its own `Sequence`;
/// numbers are only meaningful within that scope.
#[derive(Debug, Default)]
pub struct Sequence {
    next: AtomicU64,
}

impl Sequence {
    /// Create a sequence starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a sequence starting at `start`.
    #[must_use]
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Hand out the next sequence number.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Build a header for `service_method` with the next sequence number.
    #[must_use]
    pub fn header(&self, service_method: impl Into<String>) -> Header {
        Header::new(service_method, self.next())
    }
}
