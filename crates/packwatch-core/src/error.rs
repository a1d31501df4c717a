//! Error types for packwatch-core.

use std::path::PathBuf;

use miette::Diagnostic;
use packwatch_config::ConfigError;
use packwatch_registry::RegistryError;
use packwatch_utils::error::FileSystemError;
use thiserror::Error;

/// Core error type for packwatch daemon operations.
#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(code(packwatch_core::fs), help("Check file permissions and disk space"))]
    FileSystemError(#[from] FileSystemError),

    #[error("Error while {action}")]
    #[diagnostic(code(packwatch_core::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(
        code(packwatch_core::json),
        help("The state file may be corrupted; it will be replaced on the next save")
    )]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid state key: {0}")]
    #[diagnostic(
        code(packwatch_core::invalid_state_key),
        help("State keys have the form namespace/name@version:packageType:transportType")
    )]
    InvalidStateKey(String),

    #[error("Pack already exists at {}", .0.display())]
    #[diagnostic(
        code(packwatch_core::pack_exists),
        help("Enable force_overwrite to regenerate existing packs")
    )]
    PackExists(PathBuf),

    #[error("{0}")]
    #[diagnostic(code(packwatch_core::error))]
    Custom(String),
}

/// Trait for adding context to IO errors.
pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, CoreError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, CoreError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            CoreError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
