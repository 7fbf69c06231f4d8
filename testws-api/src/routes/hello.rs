//! Greeting endpoint

use axum::{response::Json, routing::get, Router};
use serde::Serialize;

use crate::AppState;

/// Greeting response
#[derive(Debug, Serialize)]
struct Greeting {
    message: String,
}

/// Greeting handler
async fn hello() -> Json<Greeting> {
    Json(Greeting {
        message: "Hello!".to_string(),
    })
}

/// Create greeting routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(hello))
}
