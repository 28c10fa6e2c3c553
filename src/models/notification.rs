// src/models/notification.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "notification_kind")]
pub enum NotificationKind {
    #[serde(rename = "NOVO_OFICIO")]
    #[sqlx(rename = "NOVO_OFICIO")]
    NewRequest,
    #[serde(rename = "DESPACHO")]
    #[sqlx(rename = "DESPACHO")]
    Dispatch,
    #[serde(rename = "ATUALIZACAO")]
    #[sqlx(rename = "ATUALIZACAO")]
    Update,
    #[serde(rename = "TRANSFERENCIA")]
    #[sqlx(rename = "TRANSFERENCIA")]
    Transfer,
    #[serde(rename = "CONCLUSAO")]
    #[sqlx(rename = "CONCLUSAO")]
    Conclusion,
    #[serde(rename = "ATRASO")]
    #[sqlx(rename = "ATRASO")]
    Overdue,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    #[schema(example = "Novo ofício nº OFICIO-2026-0001 aguardando protocolo.")]
    pub message: String,
    #[schema(example = "/demandas/detalhes/550e8400-e29b-41d4-a716-446655440000")]
    pub link: String,
    pub read: bool,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

// Notificação planejada, gravada junto com a transição ou a varredura
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub message: String,
    pub link: String,
    pub kind: NotificationKind,
}

// Resultado da varredura de atrasos
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverdueSweepReport {
    pub demands_marked: usize,
    pub notifications_created: usize,
}
