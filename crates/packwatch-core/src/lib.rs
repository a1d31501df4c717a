use error::CoreError;

pub mod error;
pub mod filter;
pub mod generator;
pub mod shutdown;
pub mod state;
pub mod watch;

pub type CoreResult<T> = std::result::Result<T, CoreError>;
