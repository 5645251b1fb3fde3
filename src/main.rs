//! Demo server hosting two controllers.
//!
//! ```text
//! route-controller [--config server.toml] [--bind 127.0.0.1:8080]
//!
//!   GET    /api/hello              → "Hello World"
//!   GET    /api/hello/:name?       → "Hello <name>"
//!   GET    /api/users              → all users
//!   GET    /api/users/:id          → one user (404 if missing)
//!   POST   /api/users              → create
//!   PUT    /api/users/:id          → update
//!   DELETE /api/users/:id          → remove
//! ```

mod demo;

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use route_controller::config::load_config;
use route_controller::observability::{logging, metrics};
use route_controller::{Dispatcher, DispatcherOptions, HttpServer, MetadataRegistry, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "route-controller", version, about = "Controller routing demo server")]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_tracing(&format!(
        "route_controller={level},tower_http={level}",
        level = config.observability.log_level
    ));

    tracing::info!("route-controller v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        middleware_timeout_ms = config.dispatcher.middleware_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let mut registry = MetadataRegistry::new();
    demo::hello::register(&mut registry);
    let store = demo::users::register(&mut registry);

    let dispatchers = [
        Dispatcher::build::<demo::hello::HelloController>(
            &registry,
            DispatcherOptions::from_config("hello", &config.dispatcher),
        )?,
        Dispatcher::build::<demo::users::UsersController>(
            &registry,
            DispatcherOptions::from_config("users", &config.dispatcher),
        )?,
    ];
    tracing::debug!(users = store.len(), "User store ready");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, &dispatchers);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
