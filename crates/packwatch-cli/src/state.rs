use std::path::PathBuf;

use nu_ansi_term::Color::{Green, Magenta, Yellow};
use packwatch_config::Config;
use packwatch_core::{state::StateStore, CoreResult};
use tracing::info;

use crate::utils::Colored;

/// Prints a read-only summary of the persisted watch state.
///
/// Reads the same file the daemon writes; the atomic save discipline makes
/// this safe to run while a daemon is mid-cycle.
pub fn display_state(config: &Config, state_file: Option<String>) -> CoreResult<()> {
    let path = match state_file.or_else(|| config.state_file.clone()) {
        Some(path) => PathBuf::from(path),
        None => config.settings()?.state_file,
    };

    let store = StateStore::new(path);
    let state = store.load()?;

    match state.last_poll {
        Some(last_poll) => info!("Last poll: {}", last_poll.to_rfc3339()),
        None => info!("Last poll: never"),
    }
    info!("Tracked entries: {}", state.servers.len());

    for (key, server) in &state.servers {
        match server.generated_at {
            Some(generated_at) => {
                info!(
                    "[{}] generated {}",
                    Colored(Magenta, key),
                    Colored(Green, generated_at.to_rfc3339())
                );
            }
            None => {
                info!(
                    "[{}] {}",
                    Colored(Magenta, key),
                    Colored(Yellow, "never generated")
                );
            }
        }
    }

    Ok(())
}
