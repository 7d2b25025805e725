use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    switchboard_config::SwitchboardConfig,
    switchboard_dispatch::PhonePolicy,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "switchboard", about = "Switchboard: multi-tenant WhatsApp HTTP gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, global = true, env = "SWITCHBOARD_CONFIG")]
    config: Option<PathBuf>,

    // Gateway arguments (used when no subcommand is provided, or with `gateway` subcommand)
    /// Address to bind to (overrides config value).
    #[arg(long, global = true, env = "SWITCHBOARD_BIND")]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true, env = "SWITCHBOARD_PORT")]
    port: Option<u16>,
    /// Root directory for per-session credentials (overrides config value).
    #[arg(long, global = true)]
    auth_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Print the internal id a session name is stored under.
    Normalize { name: String },
    /// Print the address a phone number is delivered to.
    Phone { number: String },
    /// Print a documented default config file.
    Config,
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

fn load_config(cli: &Cli) -> anyhow::Result<SwitchboardConfig> {
    let mut config = match &cli.config {
        Some(path) => switchboard_config::load_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => switchboard_config::discover_and_load(),
    };
    if let Some(dir) = &cli.auth_dir {
        config.sessions.auth_dir = Some(dir.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Gateway) => {
            info!(version = env!("CARGO_PKG_VERSION"), "switchboard starting");

            // CLI args override config values
            let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
            let port = cli.port.unwrap_or(config.server.port);
            switchboard_gateway::start_gateway(config, &bind, port).await
        },
        Some(Commands::Normalize { name }) => {
            let id = switchboard_sessions::normalize(&name);
            anyhow::ensure!(!id.is_empty(), "{name:?} has no usable characters");
            println!("{id}");
            Ok(())
        },
        Some(Commands::Phone { number }) => {
            let address = PhonePolicy::from_config(&config.dispatch).normalize(&number)?;
            println!("{address}");
            Ok(())
        },
        Some(Commands::Config) => {
            let port = cli.port.unwrap_or(config.server.port);
            print!("{}", switchboard_config::default_config_template(port));
            Ok(())
        },
    }
}
