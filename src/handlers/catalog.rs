// src/handlers/catalog.rs

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::catalog::{Department, Service},
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ServiceQuery {
    pub department_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/departments",
    tag = "Catalog",
    responses((status = 200, description = "Secretarias em ordem alfabética", body = Vec<Department>)),
    security(("api_jwt" = []))
)]
pub async fn list_departments(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let departments = app_state
        .store
        .catalog()
        .list_departments()
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(departments))
}

#[utoipa::path(
    get,
    path = "/api/services",
    tag = "Catalog",
    params(ServiceQuery),
    responses((status = 200, description = "Carta de serviços", body = Vec<Service>)),
    security(("api_jwt" = []))
)]
pub async fn list_services(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    Query(query): Query<ServiceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let services = app_state
        .store
        .catalog()
        .list_services(query.department_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(services))
}
