//! Push device registration handlers

use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rentledger_common::{
    auth::Caller,
    errors::Result,
    models::{DeviceToken, RegisterToken},
    services::devices,
};

pub async fn register_token(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<RegisterToken>,
) -> Result<(StatusCode, Json<DeviceToken>)> {
    let token = devices::register_token(state.store.as_ref(), &caller, input).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

pub async fn remove_token(
    State(state): State<AppState>,
    caller: Caller,
    Path(token): Path<String>,
) -> Result<StatusCode> {
    devices::remove_token(state.store.as_ref(), &caller, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}
