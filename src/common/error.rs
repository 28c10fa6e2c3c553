use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::{middleware::i18n::Locale, models::demand::DemandStatus};

// Erros do domínio. Cada variante tem um código estável (`code`) que o cliente pode usar.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("ID da secretaria de destino ausente")]
    MissingDepartmentId,

    #[error("Status inválido: {0}")]
    InvalidStatus(String),

    #[error("Demanda já enviada")]
    AlreadySubmitted,

    #[error("Operação '{operation}' não permitida no status {status}")]
    InvalidState {
        operation: &'static str,
        status: DemandStatus,
    },

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Demanda {0} não encontrada")]
    DemandNotFound(Uuid),

    #[error("Secretaria {0} não encontrada")]
    DepartmentNotFound(Uuid),

    #[error("Serviço {0} não encontrado")]
    ServiceNotFound(Uuid),

    #[error("Notificação {0} não encontrada")]
    NotificationNotFound(Uuid),

    // Sinalizado pelo store quando o código gerado já existe. Tratado com retry no alocador.
    #[error("Protocolo duplicado: {0}")]
    ProtocolConflict(String),

    #[error("Não foi possível alocar um protocolo após {0} tentativas")]
    ProtocolAllocationExhausted(u32),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::MissingDepartmentId => "MISSING_DEPARTMENT_ID",
            AppError::InvalidStatus(_) => "INVALID_STATUS",
            AppError::AlreadySubmitted => "ALREADY_SUBMITTED",
            AppError::InvalidState { .. } => "INVALID_STATE",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidToken | AppError::JwtError(_) => "INVALID_TOKEN",
            AppError::DemandNotFound(_) => "DEMAND_NOT_FOUND",
            AppError::DepartmentNotFound(_) => "DEPARTMENT_NOT_FOUND",
            AppError::ServiceNotFound(_) => "SERVICE_NOT_FOUND",
            AppError::NotificationNotFound(_) => "NOTIFICATION_NOT_FOUND",
            AppError::ProtocolConflict(_) => "PROTOCOL_CONFLICT",
            AppError::ProtocolAllocationExhausted(_) => "PROTOCOL_ALLOCATION_EXHAUSTED",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::MissingDepartmentId
            | AppError::InvalidStatus(_)
            | AppError::AlreadySubmitted
            | AppError::InvalidState { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidToken | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::DemandNotFound(_)
            | AppError::DepartmentNotFound(_)
            | AppError::ServiceNotFound(_)
            | AppError::NotificationNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProtocolConflict(_) | AppError::ProtocolAllocationExhausted(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Mensagem para o usuário final, no idioma pedido (pt é o padrão do sistema).
    fn message(&self, locale: &Locale) -> String {
        let en = locale.is_english();
        match self {
            AppError::ValidationError(_) => pick(en, "Um ou mais campos são inválidos.", "One or more fields are invalid."),
            AppError::MissingDepartmentId => pick(
                en,
                "O ID da secretaria de destino é obrigatório.",
                "The destination department id is required.",
            ),
            AppError::InvalidStatus(raw) => {
                let valid = DemandStatus::MANUAL_TARGETS.map(|s| s.code()).join(", ");
                if en {
                    format!("Status '{raw}' is invalid. Valid values: {valid}.")
                } else {
                    format!("O status '{raw}' é inválido. Válidos: {valid}.")
                }
            }
            AppError::AlreadySubmitted => pick(en, "Esta demanda já foi enviada.", "This request was already submitted."),
            AppError::InvalidState { operation, status } => {
                if en {
                    format!("Operation '{operation}' is not allowed while the request is {status}.")
                } else {
                    format!("A operação '{operation}' não é permitida com a demanda em '{}'.", status.label())
                }
            }
            AppError::Forbidden(reason) => {
                if en {
                    format!("You are not allowed to perform this action ({reason}).")
                } else {
                    format!("Você não tem permissão para realizar esta ação ({reason}).")
                }
            }
            AppError::InvalidToken | AppError::JwtError(_) => pick(
                en,
                "Token de autenticação inválido ou ausente.",
                "Missing or invalid authentication token.",
            ),
            AppError::DemandNotFound(_) => pick(en, "Demanda não encontrada.", "Request not found."),
            AppError::DepartmentNotFound(_) => pick(en, "Secretaria não encontrada.", "Department not found."),
            AppError::ServiceNotFound(_) => pick(en, "Serviço não encontrado.", "Service not found."),
            AppError::NotificationNotFound(_) => pick(en, "Notificação não encontrada.", "Notification not found."),
            AppError::ProtocolConflict(_) | AppError::ProtocolAllocationExhausted(_) => pick(
                en,
                "Não foi possível gerar o número de protocolo. Tente novamente.",
                "Could not allocate a protocol number. Please retry.",
            ),
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                pick(en, "Ocorreu um erro inesperado.", "An unexpected error occurred.")
            }
        }
    }

    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Erro Interno do Servidor: {:?}", self);
        }

        let details = match self {
            AppError::ValidationError(errors) => {
                let mut details = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            _ => None,
        };

        ApiError {
            status,
            code: self.code(),
            error: self.message(locale),
            details,
        }
    }
}

fn pick(en: bool, pt: &str, english: &str) -> String {
    if en { english.to_string() } else { pt.to_string() }
}

// O erro já traduzido que vai para o cliente.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

// Para rotas sem extrator de idioma, usa o padrão (pt).
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AppError::AlreadySubmitted.code(), "ALREADY_SUBMITTED");
        assert_eq!(AppError::MissingDepartmentId.code(), "MISSING_DEPARTMENT_ID");
        assert_eq!(AppError::Forbidden("x".into()).code(), "FORBIDDEN");
        assert_eq!(AppError::DepartmentNotFound(Uuid::nil()).code(), "DEPARTMENT_NOT_FOUND");
    }

    #[test]
    fn api_error_uses_requested_language() {
        let pt = AppError::AlreadySubmitted.to_api_error(&Locale("pt".into()));
        let en = AppError::AlreadySubmitted.to_api_error(&Locale("en".into()));
        assert_eq!(pt.error, "Esta demanda já foi enviada.");
        assert_eq!(en.error, "This request was already submitted.");
        assert_eq!(pt.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn state_conflict_maps_to_bad_request() {
        let err = AppError::InvalidState {
            operation: "dispatch",
            status: DemandStatus::Draft,
        };
        let api = err.to_api_error(&Locale::default());
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, "INVALID_STATE");
        assert!(api.error.contains("Rascunho"));
    }
}
