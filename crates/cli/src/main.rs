//! warelay entry point: config, telemetry, session runtime, HTTP server.

use std::path::PathBuf;

use {
    clap::Parser,
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use warelay_gateway::AppState;

#[derive(Parser)]
#[command(name = "warelay", about = "HTTP relay for a delegated WhatsApp Web session")]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long)]
    port: Option<u16>,

    /// Config file to load instead of the discovered one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for session storage (overrides config value).
    #[arg(long, env = "WARELAY_DATA_DIR")]
    data_dir: Option<PathBuf>,
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "warelay starting");

    let mut config = match cli.config {
        Some(ref path) => warelay_config::load_config(path)?,
        None => warelay_config::discover_and_load(),
    };
    warelay_config::apply_env_overrides(&mut config);

    // CLI args override config values.
    let bind = cli.bind.unwrap_or(config.server.bind);
    let port = cli.port.unwrap_or(config.server.port);
    let data_dir = cli
        .data_dir
        .or(config.session.data_dir)
        .or_else(warelay_config::data_dir)
        .unwrap_or_else(|| PathBuf::from(".warelay"));

    let cancel = CancellationToken::new();
    let (session, supervisor) =
        warelay_session::start(&data_dir, &config.session.device_name, cancel.clone()).await?;

    let state = AppState::new(session, config.auth.api_key);
    let app = warelay_gateway::build_app(state);

    let listener = TcpListener::bind((bind.as_str(), port)).await?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    warelay_gateway::serve(listener, app, cancel.clone()).await?;

    cancel.cancel();
    let _ = supervisor.await;

    info!("warelay stopped");
    Ok(())
}
