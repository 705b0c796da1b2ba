//! # beacon-core
//!
//! Core types and error definitions shared by the Beacon crates.
//!
//! This crate provides:
//! - Error types (`CodecError`, `TransportError`)
//! - RPC exchange types (`Header`, `Message`, `Sequence`)
//! - `TaskHandle` for cancellable background loops

mod error;
mod message;
mod task;

pub use error::{CodecError, TransportError};
pub use message::{ArchivedHeader, Header, Message, Sequence};
pub use task::{Shutdown, TaskHandle};
