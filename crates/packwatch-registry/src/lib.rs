//! Registry listing client for the packwatch daemon.
//!
//! This crate provides the wire model for registry entries and the
//! [`RegistryClient`] seam the reconcile loop polls through. The bundled
//! [`HttpRegistryClient`] walks a cursor-paginated JSON listing endpoint.

pub mod client;
pub mod entry;
pub mod error;

pub use client::{HttpRegistryClient, RegistryClient};
pub use entry::{PackageEntry, RemoteServer};
pub use error::{RegistryError, Result};
