// src/models/catalog.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "service_kind")]
pub enum ServiceKind {
    #[serde(rename = "EVENTO")]
    #[sqlx(rename = "EVENTO")]
    Event,
    #[serde(rename = "ATENDIMENTO")]
    #[sqlx(rename = "ATENDIMENTO")]
    Attendance,
    #[serde(rename = "SERVICO")]
    #[sqlx(rename = "SERVICO")]
    Service,
    #[serde(rename = "VISTORIA")]
    #[sqlx(rename = "VISTORIA")]
    Inspection,
    #[serde(rename = "IMPLANTACAO")]
    #[sqlx(rename = "IMPLANTACAO")]
    Deployment,
}

// ---
// Secretaria
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    #[schema(example = "Secretaria de Obras")]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// ---
// Serviço (Carta de Serviços)
// ---
// A secretaria dona do serviço define para onde as demandas são encaminhadas.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    #[schema(example = "Tapa-buraco")]
    pub name: String,
    pub kind: ServiceKind,
    pub department_id: Uuid,
    // Prazo em dias. Nulo = sem prazo controlado.
    #[schema(example = 30)]
    pub deadline_days: Option<i32>,
}
