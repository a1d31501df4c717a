use std::sync::Arc;

use packwatch_config::{config::split_list_arg, Config};
use packwatch_core::{
    generator::FsPackGenerator,
    shutdown::{self, ShutdownHandle},
    watch::Watcher,
    CoreResult,
};
use packwatch_registry::HttpRegistryClient;
use tracing::info;

/// CLI overrides applied on top of the configuration file.
#[derive(Default)]
pub struct WatchOverrides {
    pub registry_url: Option<String>,
    pub interval: Option<String>,
    pub output_dir: Option<String>,
    pub state_file: Option<String>,
    pub package_types: Option<String>,
    pub transport_types: Option<String>,
    pub dry_run: bool,
    pub force_overwrite: bool,
}

impl WatchOverrides {
    fn apply(self, mut config: Config) -> Config {
        if self.registry_url.is_some() {
            config.registry_url = self.registry_url;
        }
        if self.interval.is_some() {
            config.poll_interval = self.interval;
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir;
        }
        if self.state_file.is_some() {
            config.state_file = self.state_file;
        }
        if let Some(types) = self.package_types {
            config.package_types = Some(split_list_arg(&types));
        }
        if let Some(types) = self.transport_types {
            config.transport_types = Some(split_list_arg(&types));
        }
        if self.dry_run {
            config.dry_run = Some(true);
        }
        if self.force_overwrite {
            config.force_overwrite = Some(true);
        }
        config
    }
}

/// Runs the watch daemon until a termination signal arrives.
pub async fn run_watch(config: Config, overrides: WatchOverrides) -> CoreResult<()> {
    let settings = overrides.apply(config).settings()?;

    let registry = Arc::new(HttpRegistryClient::new(&settings.registry_url)?);
    let generator = Arc::new(FsPackGenerator);
    let watcher = Watcher::new(settings, registry, generator)?;

    let (handle, shutdown_rx) = shutdown::channel();
    spawn_signal_listener(handle)?;

    watcher.run(shutdown_rx).await
}

/// Forwards SIGINT/SIGTERM to the shutdown channel.
fn spawn_signal_listener(handle: ShutdownHandle) -> CoreResult<()> {
    #[cfg(unix)]
    {
        use packwatch_core::error::CoreError;
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).map_err(|err| {
            CoreError::Custom(format!("Failed to install SIGTERM handler: {err}"))
        })?;

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            }
            handle.trigger();
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received interrupt, shutting down");
            handle.trigger();
        });
    }

    Ok(())
}
