//! TestWS demo server
//!
//! Serves a greeting endpoint and a periodic quote stream over WebSocket,
//! both under the `/testws` prefix.

mod config;
mod routes;

use axum::{
    http::{header, HeaderName, Method},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use testws_services::{ConnectionRegistry, TickPublisher, WebSocketState};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::ServerConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ws_state: WebSocketState,
}

/// Build the application router
fn app(state: AppState) -> Router {
    // Permissive CORS on every response
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PATCH,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            header::ORIGIN,
            header::ACCEPT,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCESS_CONTROL_REQUEST_METHOD,
            header::ACCESS_CONTROL_REQUEST_HEADERS,
        ]);

    Router::new()
        .nest("/testws", routes::testws_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,testws_api=debug")),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let registry = Arc::new(ConnectionRegistry::new());
    let ws_state = WebSocketState::with_registry(Arc::clone(&registry));

    // Start the quote publisher; it runs for the life of the process
    let publisher = Arc::new(TickPublisher::new(registry, config.publisher.clone()));
    let _publisher_handle = publisher.start();

    let state = AppState { ws_state };
    let router = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("TestWS listening on http://{}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
