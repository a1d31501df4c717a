//! Error types for the registry crate.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while listing registry entries.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    #[diagnostic(
        code(packwatch_registry::http),
        help("Check your network connection and the registry URL")
    )]
    UreqError(#[from] ureq::Error),

    #[error("Failed to fetch from registry: {0}")]
    #[diagnostic(
        code(packwatch_registry::fetch_remote),
        help("Verify the registry URL is correct and accessible")
    )]
    FailedToFetchRemote(String),

    #[error(transparent)]
    #[diagnostic(
        code(packwatch_registry::json),
        help("The listing response may be corrupted or in an unexpected format")
    )]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    #[diagnostic(
        code(packwatch_registry::invalid_url),
        help("Ensure the registry URL is valid and properly formatted")
    )]
    InvalidUrl(String),
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
