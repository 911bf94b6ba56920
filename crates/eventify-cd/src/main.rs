mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "eventify-cd",
    about = "Webhook-triggered continuous deployment: clone, bump, build, push and publish",
    version,
    propagate_version = true
)]
struct Cli {
    /// YAML config file (default: built-in eventify settings)
    #[arg(long, global = true, env = "EVENTIFY_CD_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for webhook triggers and deploy on POST /
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0", env = "EVENTIFY_CD_HOST")]
        host: String,

        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "5000", env = "EVENTIFY_CD_PORT")]
        port: u16,
    },

    /// Run the deployment sequence once, ignoring the cooldown
    Deploy,

    /// Bump the patch version in a packaging metadata file
    Bump {
        /// Metadata file to rewrite (e.g. setup.py)
        file: PathBuf,

        /// Distribution name used in download URLs (default: package.name from config)
        #[arg(long)]
        package: Option<String>,

        /// Print the rewritten file instead of saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect or scaffold the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Deploy => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve { host, port } => cmd::serve::run(config_path, &host, port),
        Commands::Deploy => cmd::deploy::run(config_path, cli.json),
        Commands::Bump {
            file,
            package,
            dry_run,
        } => cmd::bump::run(config_path, &file, package.as_deref(), dry_run, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config_path, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
