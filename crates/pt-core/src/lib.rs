//! # pt-core
//!
//! Shared types for the phototab photon-table engine: the error taxonomy,
//! the photon detection record consumed by tables, and the [`EventSource`]
//! boundary through which external propagation codes hand records over.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod source;

pub use error::{Error, Result};
pub use record::PhotonRecord;
pub use source::EventSource;

/// Crate version, stamped into CLI output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
