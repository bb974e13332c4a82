//! Scheduled notification trigger

use crate::AppState;
use axum::{extract::State, Json};
use rentledger_common::{
    errors::Result,
    services::notifications::{dispatch_overdue, DispatchSummary},
};

/// Run one overdue-balance dispatch. Per-user failures are reported in the
/// summary with a 200; only a failure to enumerate users is an error.
pub async fn send_notifications(State(state): State<AppState>) -> Result<Json<DispatchSummary>> {
    let summary = dispatch_overdue(state.store.as_ref(), state.push.as_ref(), &state.config.push.link).await?;
    Ok(Json(summary))
}
