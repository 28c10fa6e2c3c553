// src/handlers/demands.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::demand::{Demand, DemandContent, DemandFilter, DemandPatch, DemandStatus, TransferAck},
};

// ---
// Filtros da listagem
// ---
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DemandListQuery {
    /// Código exato do status (ex.: PROTOCOLADO)
    pub status: Option<String>,
    /// Lista separada por vírgula (ex.: PROTOCOLADO,EM_EXECUCAO)
    pub status_in: Option<String>,
    pub status_exclude: Option<String>,
    pub author_id: Option<Uuid>,
    pub destination_department_id: Option<Uuid>,
}

fn parse_status(raw: &str) -> Result<DemandStatus, AppError> {
    DemandStatus::parse_code(raw).ok_or_else(|| AppError::InvalidStatus(raw.to_string()))
}

impl DemandListQuery {
    pub fn into_filter(self) -> Result<DemandFilter, AppError> {
        let status_in = match self.status_in.as_deref() {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(parse_status)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(DemandFilter {
            status: self.status.as_deref().map(parse_status).transpose()?,
            status_in,
            status_exclude: self.status_exclude.as_deref().map(parse_status).transpose()?,
            author_id: self.author_id,
            destination_department_id: self.destination_department_id,
        })
    }
}

// ---
// Payloads das transições
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    pub department_id: Option<Uuid>,
    /// Número de processo ou ofício externo, registrado no histórico
    #[validate(length(max = 100, message = "A referência externa deve ter no máximo 100 caracteres."))]
    #[schema(example = "SEI 0012345/2026")]
    pub external_reference: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
    #[schema(example = "EM_EXECUCAO")]
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveTransferPayload {
    pub new_department_id: Option<Uuid>,
}

// ---
// CRUD
// ---

#[utoipa::path(
    get,
    path = "/api/demands",
    tag = "Demands",
    params(DemandListQuery),
    responses(
        (status = 200, description = "Demandas, mais recentes primeiro", body = Vec<Demand>),
        (status = 400, description = "Status inválido no filtro")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_demands(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    Query(query): Query<DemandListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter().map_err(|e| e.to_api_error(&locale))?;
    let demands = app_state
        .demand_service
        .list(&filter)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(demands))
}

#[utoipa::path(
    post,
    path = "/api/demands",
    tag = "Demands",
    request_body = DemandContent,
    responses(
        (status = 201, description = "Rascunho criado", body = Demand),
        (status = 404, description = "Serviço não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_demand(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<DemandContent>,
) -> Result<impl IntoResponse, ApiError> {
    let demand = app_state
        .demand_service
        .create_draft(&user, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok((StatusCode::CREATED, Json(demand)))
}

#[utoipa::path(
    get,
    path = "/api/demands/{id}",
    tag = "Demands",
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 200, description = "Demanda", body = Demand),
        (status = 404, description = "Demanda não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_demand(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let demand = app_state.demand_service.get(id).await.map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(demand))
}

#[utoipa::path(
    put,
    path = "/api/demands/{id}",
    tag = "Demands",
    request_body = DemandContent,
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 200, description = "Rascunho atualizado", body = Demand),
        (status = 400, description = "A demanda não é mais rascunho")
    ),
    security(("api_jwt" = []))
)]
pub async fn replace_demand(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DemandContent>,
) -> Result<impl IntoResponse, ApiError> {
    let demand = app_state
        .demand_service
        .replace_draft(id, &user, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(demand))
}

#[utoipa::path(
    patch,
    path = "/api/demands/{id}",
    tag = "Demands",
    request_body = DemandPatch,
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses((status = 200, description = "Demanda atualizada", body = Demand)),
    security(("api_jwt" = []))
)]
pub async fn patch_demand(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DemandPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let demand = app_state
        .demand_service
        .patch(id, &user, payload)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(demand))
}

#[utoipa::path(
    delete,
    path = "/api/demands/{id}",
    tag = "Demands",
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 204, description = "Rascunho excluído"),
        (status = 400, description = "Apenas rascunhos podem ser excluídos")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_demand(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .demand_service
        .delete_draft(id, &user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---
// Transições
// ---

#[utoipa::path(
    post,
    path = "/api/demands/{id}/submit",
    tag = "Demands",
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 200, description = "Demanda enviada ao Protocolo", body = Demand),
        (status = 400, description = "Demanda já enviada")
    ),
    security(("api_jwt" = []))
)]
pub async fn submit_demand(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let demand = app_state
        .demand_service
        .submit(id, &user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(demand))
}

#[utoipa::path(
    post,
    path = "/api/demands/{id}/dispatch",
    tag = "Demands",
    request_body = DispatchPayload,
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 200, description = "Demanda protocolada e despachada", body = Demand),
        (status = 400, description = "Status inválido ou secretaria ausente"),
        (status = 403, description = "Apenas o Protocolo pode despachar"),
        (status = 404, description = "Secretaria não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn dispatch_demand(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DispatchPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let demand = app_state
        .demand_service
        .dispatch(id, &user, payload.department_id, payload.external_reference)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(demand))
}

#[utoipa::path(
    post,
    path = "/api/demands/{id}/status",
    tag = "Demands",
    request_body = UpdateStatusPayload,
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 200, description = "Status atualizado", body = Demand),
        (status = 400, description = "Status inválido para a demanda")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_demand_status(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let demand = app_state
        .demand_service
        .update_status(id, &user, &payload.status)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(demand))
}

#[utoipa::path(
    post,
    path = "/api/demands/{id}/transfer-request",
    tag = "Demands",
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 200, description = "Transferência solicitada", body = TransferAck),
        (status = 403, description = "Apenas a secretaria de destino pode solicitar")
    ),
    security(("api_jwt" = []))
)]
pub async fn request_transfer(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let ack = app_state
        .demand_service
        .request_transfer(id, &user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(ack))
}

#[utoipa::path(
    post,
    path = "/api/demands/{id}/transfer-approval",
    tag = "Demands",
    request_body = ApproveTransferPayload,
    params(("id" = Uuid, Path, description = "ID da demanda")),
    responses(
        (status = 200, description = "Transferência aprovada", body = TransferAck),
        (status = 400, description = "A demanda não aguarda transferência"),
        (status = 403, description = "Apenas o Protocolo pode aprovar"),
        (status = 404, description = "Nova secretaria não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_transfer(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApproveTransferPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let ack = app_state
        .demand_service
        .approve_transfer(id, &user, payload.new_department_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;
    Ok(Json(ack))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_parses_comma_separated_statuses() {
        let query = DemandListQuery {
            status_in: Some("protocolado, EM_EXECUCAO,".into()),
            status_exclude: Some("RASCUNHO".into()),
            ..Default::default()
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.status_in, vec![DemandStatus::Protocoled, DemandStatus::InExecution]);
        assert_eq!(filter.status_exclude, Some(DemandStatus::Draft));
        assert!(filter.status.is_none());
    }

    #[test]
    fn list_query_rejects_unknown_status() {
        let query = DemandListQuery {
            status: Some("ARQUIVADO".into()),
            ..Default::default()
        };
        assert!(matches!(query.into_filter(), Err(AppError::InvalidStatus(_))));
    }
}
