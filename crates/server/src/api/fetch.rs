//! Fetch and schedule API handlers.
//!
//! Targets are addressed as `<module path>/@v/<version>`, with both parts
//! escaped the way the module proxy escapes them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use modfetch_core::{
    origin::decode_path, queue::spawn_detached, FetchTask, ScheduleOptions, Status,
};
use tracing::{error, warn};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters accepted by both endpoints
#[derive(Debug, Default, Deserialize)]
pub struct FetchParams {
    /// Ask the origin to serve only what it already has
    #[serde(default)]
    pub disable_origin_fetch: bool,
    /// Who asked, for logs and metrics
    pub source: Option<String>,
    /// De-duplication suffix (schedule only)
    pub suffix: Option<String>,
}

impl FetchParams {
    fn schedule_options(&self) -> ScheduleOptions {
        ScheduleOptions {
            suffix: self.suffix.clone(),
            disable_origin_fetch: self.disable_origin_fetch,
            source: self.source.clone(),
        }
    }
}

/// Response for a synchronous fetch
#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub module_path: String,
    pub requested_version: String,
    pub resolved_version: Option<String>,
    pub status: Status,
    pub error: Option<String>,
}

/// Response for a schedule request
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub module_path: String,
    pub version: String,
    /// False when an identical task was already pending
    pub enqueued: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct FetchErrorResponse {
    pub error: String,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<FetchErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(FetchErrorResponse {
            error: message.into(),
        }),
    )
}

/// Splits `<escaped path>/@v/<escaped version>` into its decoded parts.
pub fn parse_target(target: &str) -> Result<(String, String), String> {
    let target = target.trim_start_matches('/');
    let (path, version) = target
        .split_once("/@v/")
        .ok_or_else(|| format!("expected <module>/@v/<version>, got {target:?}"))?;
    if path.is_empty() || version.is_empty() {
        return Err(format!("empty module path or version in {target:?}"));
    }
    let path = decode_path(path).ok_or_else(|| format!("invalid module path escape: {path:?}"))?;
    let version =
        decode_path(version).ok_or_else(|| format!("invalid version escape: {version:?}"))?;
    Ok((path, version))
}

// ============================================================================
// Handlers
// ============================================================================

/// Run the fetch pipeline now and answer with the outcome.
///
/// The pipeline runs on its own task, so a caller that gives up (the task
/// service's dispatch deadline, a dropped connection) does not cut it short.
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    Query(params): Query<FetchParams>,
) -> impl IntoResponse {
    let (module_path, version) = match parse_target(&target) {
        Ok(parts) => parts,
        Err(e) => return bad_request(e).into_response(),
    };

    let task = FetchTask::new(&module_path, &version).with_options(&params.schedule_options());
    let request_id = task.request_id.clone();
    let fetcher = state.shared_fetcher();
    let ceiling = state.task_timeout();

    let result = spawn_detached(&request_id, async move {
        tokio::time::timeout(ceiling, fetcher.fetch(&task)).await
    })
    .await;

    let (status, resolved_version, error) = match result {
        Ok(Ok(outcome)) => (
            outcome.status,
            outcome.resolved_version.clone(),
            outcome.error_message(),
        ),
        Ok(Err(_)) => {
            warn!(%module_path, %version, timeout_secs = ceiling.as_secs(), "Fetch timed out");
            (
                Status::TimedOut,
                None,
                Some(format!("fetch exceeded {}s", ceiling.as_secs())),
            )
        }
        Err(e) => {
            error!(%module_path, %version, error = %e, "Fetch task panicked");
            (Status::InternalError, None, Some(e.to_string()))
        }
    };
    let code = StatusCode::from_u16(status.http_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        code,
        Json(FetchResponse {
            module_path,
            requested_version: version,
            resolved_version,
            status,
            error,
        }),
    )
        .into_response()
}

/// Enqueue a fetch through the configured queue
pub async fn schedule(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    Query(params): Query<FetchParams>,
) -> impl IntoResponse {
    let (module_path, version) = match parse_target(&target) {
        Ok(parts) => parts,
        Err(e) => return bad_request(e).into_response(),
    };

    match state
        .queue()
        .schedule_fetch(&module_path, &version, &params.schedule_options())
        .await
    {
        Ok(enqueued) => (
            StatusCode::ACCEPTED,
            Json(ScheduleResponse {
                module_path,
                version,
                enqueued,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(%module_path, %version, error = %e, "Failed to schedule fetch");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(FetchErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
