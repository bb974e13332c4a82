//! Tenant handlers

use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rentledger_common::{
    auth::Caller,
    errors::Result,
    models::{NewTenant, Tenant, TenantUpdate},
    services::{
        tenants::{self, TenantFilter},
        CascadeReport,
    },
};

pub async fn list_tenants(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<TenantFilter>,
) -> Result<Json<Vec<Tenant>>> {
    Ok(Json(tenants::list_tenants(state.store.as_ref(), &caller, &filter).await?))
}

/// Add a tenant to a vacant unit; 409 if the unit is taken
pub async fn create_tenant(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewTenant>,
) -> Result<(StatusCode, Json<Tenant>)> {
    let tenant = tenants::create_tenant(state.store.as_ref(), &caller, input).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

pub async fn get_tenant(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Tenant>> {
    Ok(Json(tenants::get_tenant(state.store.as_ref(), &caller, &id).await?))
}

pub async fn update_tenant(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(input): Json<TenantUpdate>,
) -> Result<Json<Tenant>> {
    Ok(Json(tenants::update_tenant(state.store.as_ref(), &caller, &id, input).await?))
}

pub async fn delete_tenant(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CascadeReport>> {
    Ok(Json(tenants::delete_tenant(state.store.as_ref(), &caller, &id).await?))
}
