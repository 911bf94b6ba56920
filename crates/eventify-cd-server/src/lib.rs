pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with the trigger and status routes.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(routes::trigger::trigger_deploy))
        .route("/status", get(routes::status::get_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the webhook endpoint on a pre-bound listener until the future is
/// dropped or the listener fails.
pub async fn serve_on(state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(state);

    tracing::info!("deployment webhook listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
