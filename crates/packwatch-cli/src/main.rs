use clap::Parser;
use cli::{Args, Commands};
use logging::setup_logging;
use packwatch_config::{config::generate_default_config, Config};
use packwatch_core::CoreResult;
use tracing::info;
use utils::COLOR;
use watch::WatchOverrides;

mod cli;
mod logging;
mod state;
mod utils;
mod watch;

const DEFAULT_CONFIG_PATH: &str = "packwatch.toml";

async fn handle_cli() -> CoreResult<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        let mut color = COLOR.write().unwrap();
        *color = false;
    }

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

    match args.command {
        Commands::DefConfig => {
            generate_default_config(config_path)?;
            info!("Wrote default configuration to {config_path}");
        }
        Commands::Watch {
            registry_url,
            interval,
            output_dir,
            state_file,
            package_types,
            transport_types,
            dry_run,
            force_overwrite,
        } => {
            let config = Config::load(config_path)?;
            let overrides = WatchOverrides {
                registry_url,
                interval,
                output_dir,
                state_file,
                package_types,
                transport_types,
                dry_run,
                force_overwrite,
            };
            watch::run_watch(config, overrides).await?;
        }
        Commands::State { state_file } => {
            let config = Config::load(config_path)?;
            state::display_state(&config, state_file)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
