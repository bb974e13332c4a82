//! Payment handlers

use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use rentledger_common::{
    auth::Caller,
    errors::Result,
    models::{Payment, PaymentUpdate, RecordPayment},
    pdf,
    services::payments::{self, PaymentFilter},
};

pub async fn list_payments(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<PaymentFilter>,
) -> Result<Json<Vec<Payment>>> {
    Ok(Json(payments::list_payments(state.store.as_ref(), &caller, &filter).await?))
}

/// Record a payment. A retry carrying the same `idempotencyKey` returns
/// the payment written by the first attempt.
pub async fn record_payment(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<RecordPayment>,
) -> Result<(StatusCode, Json<Payment>)> {
    let payment = payments::record_payment(state.store.as_ref(), &caller, input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Payment>> {
    Ok(Json(payments::get_payment(state.store.as_ref(), &caller, &id).await?))
}

pub async fn update_payment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(input): Json<PaymentUpdate>,
) -> Result<Json<Payment>> {
    Ok(Json(payments::update_payment(state.store.as_ref(), &caller, &id, input).await?))
}

pub async fn receipt_pdf(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let payment = payments::get_payment(state.store.as_ref(), &caller, &id).await?;
    let bytes = pdf::render_receipt(&payment)?;

    let disposition = format!("inline; filename=\"receipt-{}.pdf\"", payment.receipt_number);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
