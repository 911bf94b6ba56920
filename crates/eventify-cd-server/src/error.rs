use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use eventify_cd_core::CdError;

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        let Some(e) = self.0.downcast_ref::<CdError>() else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        match e {
            CdError::InvalidVersion(_) | CdError::VersionLineMissing => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CdError::StepFailed { .. }
            | CdError::StepSpawnFailed { .. }
            | CdError::ToolNotFound(_)
            | CdError::NoDistributions { .. } => StatusCode::BAD_GATEWAY,
            CdError::ConfigNotFound(_)
            | CdError::CredentialsNotFound(_)
            | CdError::InvalidCooldown(_)
            | CdError::Io(_)
            | CdError::Yaml(_)
            | CdError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
