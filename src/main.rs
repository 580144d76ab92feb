use anyhow::Context;
use clap::Parser;
use semgate::config::{CacheBackendKind, GatewayConfig};
use semgate::{
    AppState, Cache, CacheBackend, DisabledEventBus, ElasticsearchClient, EventBus,
    GatewayServer, HttpEventBus, MemoryBackend, RedisBackend, SparqlHttpClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "semgate", version, about = "REST gateway over a SPARQL triplestore")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "SEMGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    address: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable the response cache
    #[arg(long)]
    cache: bool,

    /// Tracing filter used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_state(config: &GatewayConfig) -> anyhow::Result<AppState> {
    let registry = config.registry().context("invalid namespace configuration")?;

    let store = SparqlHttpClient::new(&config.triplestore).context("triplestore client")?;
    let search = ElasticsearchClient::new(&config.search).context("search engine client")?;

    let backend: Arc<dyn CacheBackend> = match config.cache.backend {
        CacheBackendKind::Redis => Arc::new(RedisBackend::new(config.cache.clone())),
        CacheBackendKind::Memory => Arc::new(MemoryBackend::new(config.cache.memory_capacity)),
    };
    let cache = Cache::new(backend, config.cache.enabled).with_password(config.cache.password.clone());

    let events: Arc<dyn EventBus> = if config.event_bus.enabled {
        Arc::new(HttpEventBus::new(&config.event_bus).context("event bus client")?)
    } else {
        Arc::new(DisabledEventBus)
    };

    Ok(AppState {
        registry: Arc::new(registry),
        defaults: Arc::new(config.param_defaults()),
        store: Arc::new(store),
        cache,
        search: Arc::new(search),
        events,
        search_config: Arc::new(config.search.clone()),
    })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = GatewayConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(address) = args.address {
        config.server.address = address;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.cache {
        config.cache.enabled = true;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    init_tracing(&config.log_level);
    config.validate().context("invalid configuration")?;

    info!("semgate v{}", semgate::version());
    info!("Triplestore: {}", config.triplestore.endpoint);
    if config.cache.enabled {
        info!("Cache: {:?} at {}", config.cache.backend, config.cache.endpoint());
    }

    let state = build_state(&config)?;
    GatewayServer::new(state, config.server.clone())
        .run_with_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
