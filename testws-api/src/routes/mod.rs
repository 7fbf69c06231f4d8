//! Route definitions

mod hello;
pub mod ws;

use axum::Router;

use crate::AppState;

/// Create all routes served under the /testws prefix
pub fn testws_routes() -> Router<AppState> {
    Router::new().merge(hello::routes()).merge(ws::routes())
}
