use chrono::{DateTime, Utc};
use eventify_cd_core::config::Config;
use eventify_cd_core::guard::{Clock, ReentryGuard, SystemClock};
use eventify_cd_core::pipeline::{CommandRunner, Pipeline, ProcessRunner};
use eventify_cd_core::version::Version;
use eventify_cd_core::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

/// What happened on the most recent accepted trigger.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Mutable deployment state. Held under one lock for the whole of a
/// triggered run, so the guard check and the workspace are never shared
/// between two runs.
#[derive(Debug)]
pub struct RunState {
    pub guard: ReentryGuard,
    pub last_run: Option<RunSummary>,
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub clock: Arc<dyn Clock>,
    pub run: Arc<Mutex<RunState>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_parts(config, Arc::new(ProcessRunner), Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let guard = ReentryGuard::new(config.cooldown()?);
        Ok(Self {
            pipeline: Arc::new(Pipeline::new(config, runner)),
            clock,
            run: Arc::new(Mutex::new(RunState {
                guard,
                last_run: None,
            })),
        })
    }
}
