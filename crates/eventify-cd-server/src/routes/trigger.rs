use axum::extract::State;
use axum::Json;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, RunOutcome, RunSummary};

pub const RAN_RECENTLY: &str = "Ran recently";
pub const RUNNING: &str = "Running deployment job";

/// POST / — webhook trigger for a deployment run.
///
/// The run lock is taken before the cooldown check and moves into the
/// blocking task with the pipeline, so it is released only once the run has
/// finished, even if the caller disconnects. A concurrent trigger waits for
/// the current run and is then checked against the updated timestamp.
pub async fn trigger_deploy(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut run = app.run.clone().lock_owned().await;

    let started_at = app.clock.now();
    if !run.guard.try_enter(started_at) {
        tracing::info!(
            last_accepted = ?run.guard.last_accepted(),
            "trigger rejected: inside cooldown window"
        );
        return Ok(Json(serde_json::json!({ "error": RAN_RECENTLY })));
    }

    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, "trigger accepted");

    let pipeline = app.pipeline.clone();
    let clock = app.clock.clone();
    let result = tokio::task::spawn_blocking(move || {
        let result = pipeline.run_with_id(run_id);
        let (outcome, new_version, error) = match &result {
            Ok(report) => (RunOutcome::Succeeded, Some(report.new_version), None),
            Err(e) => (RunOutcome::Failed, None, Some(e.to_string())),
        };
        run.last_run = Some(RunSummary {
            run_id,
            started_at,
            finished_at: clock.now(),
            outcome,
            new_version,
            error,
        });
        result
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?;

    result?;
    Ok(Json(serde_json::json!({ "success": RUNNING })))
}
