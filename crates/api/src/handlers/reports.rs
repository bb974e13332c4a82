//! Report and dashboard handlers

use crate::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{Datelike, Utc};
use rentledger_common::{
    auth::Caller,
    errors::Result,
    pdf,
    services::reports::{self, Dashboard, MonthlyReport},
};
use serde::Deserialize;

/// Calendar month selector; defaults to the current month
#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl MonthQuery {
    fn resolve(&self) -> (i32, u32) {
        let today = Utc::now().date_naive();
        (
            self.year.unwrap_or_else(|| today.year()),
            self.month.unwrap_or_else(|| today.month()),
        )
    }
}

pub async fn monthly_report(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthlyReport>> {
    let (year, month) = query.resolve();
    Ok(Json(reports::monthly_report(state.store.as_ref(), &caller, year, month).await?))
}

pub async fn monthly_report_pdf(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse> {
    let (year, month) = query.resolve();
    let report = reports::monthly_report(state.store.as_ref(), &caller, year, month).await?;
    let bytes = pdf::render_report(&report)?;

    let disposition = format!("inline; filename=\"payments-{}-{:02}.pdf\"", year, month);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

pub async fn dashboard(State(state): State<AppState>, caller: Caller) -> Result<Json<Dashboard>> {
    let today = Utc::now().date_naive();
    Ok(Json(reports::dashboard(state.store.as_ref(), &caller, today).await?))
}
