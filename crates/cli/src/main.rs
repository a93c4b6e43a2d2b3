mod service;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    courier_config::{CourierConfig, Severity},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "courier", about = "Courier: Telegram support relay with CRM sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (overrides discovery of ./courier.toml and the user config dir).
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the relay (default when no subcommand is provided).
    Run,
    /// Validate the configuration and exit.
    CheckConfig,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load(path: Option<&Path>) -> anyhow::Result<CourierConfig> {
    match path {
        Some(path) => {
            let mut config = courier_config::load_config(path)?;
            courier_config::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
            Ok(config)
        },
        None => courier_config::discover_and_load(),
    }
}

/// Print every diagnostic and fail if any of them is an error.
fn check(config: &CourierConfig) -> anyhow::Result<()> {
    let result = config.validate();
    for diagnostic in &result.diagnostics {
        match diagnostic.severity {
            Severity::Error => eprintln!("{diagnostic}"),
            Severity::Warning => warn!(path = diagnostic.path, "{}", diagnostic.message),
            Severity::Info => info!(path = diagnostic.path, "{}", diagnostic.message),
        }
    }
    if result.has_errors() {
        anyhow::bail!(
            "invalid configuration: {} error(s)",
            result.count(Severity::Error)
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    let config = load(cli.config.as_deref())?;
    check(&config)?;

    match cli.command {
        None | Some(Commands::Run) => service::run(config).await,
        Some(Commands::CheckConfig) => {
            println!("configuration ok");
            Ok(())
        },
    }
}
