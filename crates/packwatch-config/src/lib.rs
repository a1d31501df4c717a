pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, WatchSettings, MIN_POLL_INTERVAL};
pub use error::{ConfigError, Result};
pub use types::{PackageKind, TransportKind};
