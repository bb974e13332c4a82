//! Property handlers

use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rentledger_common::{
    auth::Caller,
    errors::Result,
    models::{Property, PropertyInput},
    services::{
        properties::{self, UnitOccupancy},
        CascadeReport,
    },
};

pub async fn list_properties(State(state): State<AppState>, caller: Caller) -> Result<Json<Vec<Property>>> {
    Ok(Json(properties::list_properties(state.store.as_ref(), &caller).await?))
}

pub async fn create_property(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<PropertyInput>,
) -> Result<(StatusCode, Json<Property>)> {
    let property = properties::create_property(state.store.as_ref(), &caller, input).await?;
    Ok((StatusCode::CREATED, Json(property)))
}

pub async fn get_property(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Property>> {
    Ok(Json(properties::get_property(state.store.as_ref(), &caller, &id).await?))
}

pub async fn update_property(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(input): Json<PropertyInput>,
) -> Result<Json<Property>> {
    Ok(Json(properties::update_property(state.store.as_ref(), &caller, &id, input).await?))
}

/// Delete the property with all of its tenants and their payments
pub async fn delete_property(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CascadeReport>> {
    Ok(Json(properties::delete_property(state.store.as_ref(), &caller, &id).await?))
}

pub async fn unit_occupancy(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<UnitOccupancy>> {
    Ok(Json(properties::unit_occupancy(state.store.as_ref(), &caller, &id).await?))
}
