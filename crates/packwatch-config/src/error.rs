use miette::Diagnostic;
use packwatch_utils::error::FileSystemError;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(packwatch_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(packwatch_config::toml_deserialize),
        help("Check your packwatch.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(packwatch_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("Unknown package type: {0}")]
    #[diagnostic(
        code(packwatch_config::invalid_package_type),
        help("Supported package types: npm, pypi, oci, nuget")
    )]
    InvalidPackageType(String),

    #[error("Unknown transport type: {0}")]
    #[diagnostic(
        code(packwatch_config::invalid_transport_type),
        help("Supported transport types: stdio, http, sse")
    )]
    InvalidTransportType(String),

    #[error("Invalid poll interval: {0}")]
    #[diagnostic(
        code(packwatch_config::invalid_poll_interval),
        help("Use a duration string such as \"30s\", \"5m\" or \"1h\"")
    )]
    InvalidPollInterval(String),

    #[error("Registry URL cannot be empty")]
    #[diagnostic(
        code(packwatch_config::missing_registry_url),
        help("Set registry_url in your config file or pass --registry-url")
    )]
    MissingRegistryUrl,

    #[error("IO error: {0}")]
    #[diagnostic(code(packwatch_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(packwatch_config::fs))]
    FileSystem(#[from] FileSystemError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
