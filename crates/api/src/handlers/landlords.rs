//! Landlord record handlers

use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rentledger_common::{
    auth::Caller,
    errors::Result,
    models::{Landlord, NewLandlord},
    services::landlords,
};

pub async fn list_landlords(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<Landlord>>> {
    Ok(Json(landlords::list_landlords(state.store.as_ref(), &caller).await?))
}

pub async fn create_landlord(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewLandlord>,
) -> Result<(StatusCode, Json<Landlord>)> {
    let landlord = landlords::create_landlord(state.store.as_ref(), &caller, input).await?;
    Ok((StatusCode::CREATED, Json(landlord)))
}

pub async fn update_landlord(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(input): Json<NewLandlord>,
) -> Result<Json<Landlord>> {
    Ok(Json(landlords::update_landlord(state.store.as_ref(), &caller, &id, input).await?))
}

pub async fn delete_landlord(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    landlords::delete_landlord(state.store.as_ref(), &caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
