use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use tracing::info;
use vanish_lifecycle::PassOutcome;

use super::AppState;
use crate::error::ServerError;

/// `POST /admin/reclaim` -- run a reclamation pass now.
///
/// Shares the reaper's guard, so a request made while the timer's pass is
/// running gets `409` instead of a second, overlapping pass.
pub async fn reclaim(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    match state.reaper.run_pass().await {
        PassOutcome::Completed(report) => {
            info!(
                scanned = report.scanned,
                reclaimed = report.reclaimed,
                "operator-requested pass finished"
            );
            Ok(Json(report))
        }
        PassOutcome::Skipped => Err(ServerError::Conflict(
            "a reclamation pass is already running".into(),
        )),
        PassOutcome::Failed(e) => Err(e.into()),
    }
}
