use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod catalog;
mod commands;
mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod state;

#[cfg(test)]
mod business_logic_tests;

use config::AppConfig;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FECANBO backend...");

    let config = match AppConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return;
        }
    };

    let pool = match db::init_pool(&config.database_url) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database pool: {}", e);
            return;
        }
    };
    if let Err(e) = db::init_database(&pool, &config).await {
        tracing::error!("Failed to initialise database: {}", e);
        return;
    }
    tracing::info!("Database connection established");

    let app_state = AppState {
        pool,
        config: config.clone(),
    };

    let app = build_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {}", addr);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

/// Routes plus the session gate, the response envelope and CORS. A built
/// frontend in `STATIC_DIR` is served for every other path.
pub(crate) fn build_app(state: AppState) -> Router {
    let mut app: Router<AppState> = routes::create_router();
    if let Some(static_dir) = &state.config.static_dir {
        tracing::info!("Serving frontend from {}", static_dir.display());
        app = app.fallback_service(
            ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html"))),
        );
    }

    app.layer(from_fn(middleware::response::wrap_response_middleware))
        .layer(from_fn_with_state(
            state.config.clone(),
            middleware::auth::auth_middleware,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
