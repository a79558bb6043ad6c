use clap::Parser;
use compliance_sentinel::{
    Sentinel,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::read_config_file,
    storage::StorageBackend,
    util,
};
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON or TOML); defaults to $SENTINEL_CONFIG or ./sentinel.json
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("compliance_sentinel", LevelFilter::TRACE),
        ("hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let path = args.file.unwrap_or_else(util::get_config_path);
    let config = read_config_file(&path)?;
    info!("loaded configuration from {path}");

    let sentinel = Sentinel::from_config(&config).await?;
    let storage = sentinel.storage.clone();
    info!("{}", storage.get_stats().await?);

    let mut api_config = ApiConfig::from(config.api.clone());
    if let Some(bind_addr) = util::get_bind_addr() {
        api_config.bind_addr = bind_addr;
    }
    if let Some(token) = util::get_api_token() {
        api_config.auth_token = Some(token);
    }
    if api_config.auth_token.is_none() {
        info!("no API token configured, endpoints are unauthenticated");
    }

    let addr = spawn_api_server(api_config, ApiState::new(sentinel)).await?;
    info!("hub ready on {addr}, waiting for ticks");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }

    info!("shutting down");
    storage.close().await?;

    Ok(())
}
