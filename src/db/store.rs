// src/db/store.rs
//
// Portas de persistência usadas pelos serviços. O adaptador de produção é o
// `PgDemandStore`; os testes usam o `MemoryStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Profile, User},
        catalog::{Department, Service},
        demand::{Demand, DemandFilter, DemandStatus},
        notification::{NewNotification, Notification, OverdueSweepReport},
        tramitacao::{NewTramitacao, Tramitacao},
    },
    services::protocol_service::ProtocolKind,
};

/// Uma transição pronta para ser gravada: o novo estado da demanda, o lançamento
/// no histórico e as notificações da mudança. O store grava tudo na mesma transação
/// e só aplica se a demanda ainda estiver em `expected_status`.
#[derive(Debug, Clone)]
pub struct TransitionCommit {
    pub demand: Demand,
    pub expected_status: DemandStatus,
    pub entry: NewTramitacao,
    pub notifications: Vec<NewNotification>,
}

/// Demanda candidata à verificação de atraso, já com o prazo do serviço.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OverdueCandidate {
    pub demand_id: Uuid,
    pub title: String,
    pub executive_protocol: Option<String>,
    pub destination_department_id: Option<Uuid>,
    pub deadline_started_at: DateTime<Utc>,
    pub deadline_days: i32,
}

/// Alertas de atraso de uma demanda. Só são gravados se a trava da demanda
/// ainda estiver livre no momento do commit.
#[derive(Debug, Clone)]
pub struct OverdueAlert {
    pub demand_id: Uuid,
    pub notifications: Vec<NewNotification>,
}

#[async_trait]
pub trait DemandStore: Send + Sync {
    // --- Usuários e catálogo ---
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn users_by_profile(&self, profile: Profile) -> Result<Vec<User>, AppError>;
    /// Uma única consulta para todas as secretarias informadas.
    async fn users_by_departments(&self, department_ids: &[Uuid]) -> Result<Vec<User>, AppError>;
    async fn find_department(&self, id: Uuid) -> Result<Option<Department>, AppError>;
    async fn find_service(&self, id: Uuid) -> Result<Option<Service>, AppError>;

    // --- Demandas ---
    async fn find_demand(&self, id: Uuid) -> Result<Option<Demand>, AppError>;
    async fn list_demands(&self, filter: &DemandFilter) -> Result<Vec<Demand>, AppError>;
    async fn insert_demand(&self, demand: &Demand) -> Result<Demand, AppError>;
    /// Grava só os campos de conteúdo; status, protocolos e datas não passam por aqui.
    async fn update_demand_content(&self, demand: &Demand) -> Result<Demand, AppError>;
    /// Remove a demanda apenas se ainda for rascunho. Retorna `false` se nada foi removido.
    async fn delete_draft(&self, id: Uuid) -> Result<bool, AppError>;

    // --- Transições ---
    async fn count_protocols(&self, kind: ProtocolKind, prefix: &str) -> Result<i64, AppError>;
    /// Atômico (demanda, tramitação e notificações). Retorna `ProtocolConflict` se um
    /// protocolo violar a unicidade e `InvalidState` se a demanda não estiver mais no
    /// status esperado.
    async fn commit_transition(&self, commit: TransitionCommit) -> Result<(Demand, Tramitacao), AppError>;

    // --- Histórico ---
    async fn append_tramitacao(&self, entry: NewTramitacao) -> Result<Tramitacao, AppError>;
    /// Mais recentes primeiro.
    async fn list_tramitacoes(&self, demand_id: Uuid) -> Result<Vec<Tramitacao>, AppError>;

    // --- Atrasos ---
    async fn overdue_candidates(&self) -> Result<Vec<OverdueCandidate>, AppError>;
    /// Trava as demandas ainda não notificadas e grava, na mesma transação, apenas os
    /// alertas das demandas que esta chamada travou.
    async fn commit_overdue(&self, alerts: &[OverdueAlert]) -> Result<OverdueSweepReport, AppError>;
}

/// Caixa de entrada do usuário.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn list_for(&self, recipient_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, AppError>;
    /// `false` se a notificação não existe ou é de outro destinatário.
    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, AppError>;
    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, AppError>;
}
