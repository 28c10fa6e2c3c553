// src/handlers/history.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::tramitacao::Tramitacao,
    services::tramitacao_service::ManualEntryRequest,
};

#[utoipa::path(
    get,
    path = "/api/demands/{id}/history",
    tag = "History",
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 200, description = "Tramitações, mais recentes primeiro", body = Vec<Tramitacao>),
        (status = 404, description = "Demanda não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_history(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = app_state
        .tramitacao_service
        .history(id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(entries))
}

#[utoipa::path(
    post,
    path = "/api/demands/{id}/history",
    tag = "History",
    request_body = ManualEntryRequest,
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 201, description = "Tramitação registrada", body = Tramitacao),
        (status = 403, description = "Tipo reservado às transições de status")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_history_entry(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ManualEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = app_state
        .tramitacao_service
        .add_manual_entry(id, &user, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok((StatusCode::CREATED, Json(entry)))
}
