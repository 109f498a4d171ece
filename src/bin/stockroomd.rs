//! stockroomd: the Stockroom daemon.
//!
//! Serves the kit catalog, ingredients and services views over HTTP,
//! backed by a shared cache store so several replicas can sit behind one
//! load balancer.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stockroom::server::config::{Config, LogFormat, Secrets};
use stockroom::upstream::zoho::accounts_host;
use stockroom::{
    CacheStore, MemoryStore, RefreshOutcome, RefreshTokenAuth, StockroomError,
    ZohoInventoryClient,
};

/// Stockroom daemon serving the storefront catalog cache.
#[derive(Parser)]
#[command(name = "stockroomd")]
#[command(version = stockroom::version::PKG_VERSION)]
#[command(about = "Stockroom catalog cache daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Override the listen address from the config file.
    #[arg(long, env = "STOCKROOM_ADDRESS")]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    init_tracing(config.logging.format);

    let address = args.address.unwrap_or_else(|| config.server.address.clone());
    let addr: SocketAddr = address
        .parse()
        .map_err(|e| StockroomError::Configuration(format!("Invalid address: {e}")))?;

    let tokens = RefreshTokenAuth::new(
        accounts_host(&config.upstream.domain),
        secrets.credentials()?,
    )?;
    let client = ZohoInventoryClient::new(
        &config.upstream.domain,
        config.upstream.organization_id()?,
        Arc::new(tokens),
    )?;

    let store = build_store(&config).await?;
    let catalog = config
        .catalog_builder()
        .source(Arc::new(client))
        .store(store)
        .build()?;

    info!(
        version = %stockroom::version::BuildInfo::current(),
        %addr,
        snapshot = %config.snapshot_path().display(),
        "stockroomd starting"
    );

    if config.catalog.prewarm {
        let orchestrator = Arc::clone(catalog.orchestrator());
        tokio::spawn(async move {
            match orchestrator.refresh().await {
                Ok(RefreshOutcome::Refreshed(items)) => {
                    info!(items = items.len(), "catalog pre-warmed")
                }
                Ok(RefreshOutcome::Skipped(reason)) => {
                    info!(?reason, "pre-warm skipped, another refresh is running")
                }
                Err(e) => error!(error = %e, "catalog pre-warm failed"),
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, stockroom::server::router(catalog))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("stockroomd stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stockroom=info,info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Build the configured store, connecting eagerly so the first request
/// does not pay for the handshake.
async fn build_store(config: &Config) -> Result<Arc<dyn CacheStore>, StockroomError> {
    let Some(url) = config.cache.redis_url.as_deref() else {
        warn!("no redis_url configured, using in-process store (lock covers this replica only)");
        return Ok(Arc::new(MemoryStore::new()));
    };

    #[cfg(feature = "redis")]
    {
        use std::time::Duration;
        use stockroom::{RedisConfig, RedisStore};

        let store = RedisStore::new(
            RedisConfig::new(url).timeout(Duration::from_millis(config.cache.timeout_ms)),
        )?;
        store.connect().await;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "redis"))]
    {
        warn!(url, "built without the redis feature, using in-process store");
        Ok(Arc::new(MemoryStore::new()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
