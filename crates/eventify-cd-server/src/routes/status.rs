use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /status — cooldown settings and the outcome of the last accepted run.
///
/// Waits for an in-flight run to finish before answering.
pub async fn get_status(State(app): State<AppState>) -> Json<serde_json::Value> {
    let run = app.run.lock().await;
    Json(serde_json::json!({
        "cooldown_secs": run.guard.cooldown().num_seconds(),
        "last_accepted": run.guard.last_accepted(),
        "last_run": run.last_run,
    }))
}
