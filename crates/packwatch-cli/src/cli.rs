use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output logs as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the registry and generate packs for new or changed entries
    #[clap(name = "watch", visible_alias = "w")]
    Watch {
        /// Registry listing endpoint URL
        #[arg(long)]
        registry_url: Option<String>,

        /// Poll interval, e.g. "30s", "5m", "1h"
        #[arg(short, long)]
        interval: Option<String>,

        /// Directory where generated packs are written
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Path of the persisted state file
        #[arg(long)]
        state_file: Option<String>,

        /// Comma-separated package types to allow (default: all)
        #[arg(long)]
        package_types: Option<String>,

        /// Comma-separated transport types to allow (default: all)
        #[arg(long)]
        transport_types: Option<String>,

        /// Evaluate what would be generated without writing anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Regenerate packs even for entries already recorded in state
        #[arg(short, long)]
        force_overwrite: bool,
    },

    /// Show the persisted watch state
    State {
        /// Path of the persisted state file
        #[arg(long)]
        state_file: Option<String>,
    },

    /// Generate a default configuration file
    DefConfig,
}
