//! Sharebox application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis
//! 3. Build router with API routes and middleware
//! 4. Start Axum server

use sharebox::{auth::middleware::AppState, config::Config, routes, storage::RedisStore};
use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Config::from_env().expect("Failed to load config");
    tracing::info!("Starting sharebox on {}", config.bind_addr);

    // Connect to Redis
    let store = RedisStore::open(&config.redis_url)
        .await
        .expect("Failed to connect to Redis");

    // Verify Redis connection
    store.ping().await.expect("Failed to connect to Redis");

    let bind_addr = config.bind_addr;
    let state = AppState::new(store, config);
    let app = routes::app(state);

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> extractors)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
