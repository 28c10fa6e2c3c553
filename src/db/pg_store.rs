// src/db/pg_store.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        store::{DemandStore, NotificationStore, OverdueAlert, OverdueCandidate, TransitionCommit},
        CatalogRepository, DemandRepository, NotificationRepository, TramitacaoRepository, UserRepository,
    },
    models::{
        auth::{Profile, User},
        catalog::{Department, Service},
        demand::{Demand, DemandFilter},
        notification::{Notification, OverdueSweepReport},
        tramitacao::{NewTramitacao, Tramitacao},
    },
    services::protocol_service::ProtocolKind,
};

// Adaptador Postgres das portas de persistência, montado sobre os repositórios
#[derive(Clone)]
pub struct PgDemandStore {
    pool: PgPool,
    users: UserRepository,
    catalog: CatalogRepository,
    demands: DemandRepository,
    tramitacoes: TramitacaoRepository,
    notifications: NotificationRepository,
}

impl PgDemandStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            catalog: CatalogRepository::new(pool.clone()),
            demands: DemandRepository::new(pool.clone()),
            tramitacoes: TramitacaoRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn catalog(&self) -> &CatalogRepository {
        &self.catalog
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }
}

#[async_trait]
impl DemandStore for PgDemandStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.users.find_by_id(id).await
    }

    async fn users_by_profile(&self, profile: Profile) -> Result<Vec<User>, AppError> {
        self.users.find_by_profile(&self.pool, profile).await
    }

    async fn users_by_departments(&self, department_ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        self.users.find_by_departments(&self.pool, department_ids).await
    }

    async fn find_department(&self, id: Uuid) -> Result<Option<Department>, AppError> {
        self.catalog.find_department(&self.pool, id).await
    }

    async fn find_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        self.catalog.find_service(&self.pool, id).await
    }

    async fn find_demand(&self, id: Uuid) -> Result<Option<Demand>, AppError> {
        self.demands.find_by_id(&self.pool, id).await
    }

    async fn list_demands(&self, filter: &DemandFilter) -> Result<Vec<Demand>, AppError> {
        self.demands.list(filter).await
    }

    async fn insert_demand(&self, demand: &Demand) -> Result<Demand, AppError> {
        self.demands.insert(&self.pool, demand).await
    }

    async fn update_demand_content(&self, demand: &Demand) -> Result<Demand, AppError> {
        self.demands
            .update_content(&self.pool, demand)
            .await?
            .ok_or(AppError::DemandNotFound(demand.id))
    }

    async fn delete_draft(&self, id: Uuid) -> Result<bool, AppError> {
        self.demands.delete_draft(&self.pool, id).await
    }

    async fn count_protocols(&self, kind: ProtocolKind, prefix: &str) -> Result<i64, AppError> {
        self.demands.count_protocols(&self.pool, kind, prefix).await
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<(Demand, Tramitacao), AppError> {
        let TransitionCommit { demand, expected_status, entry, notifications } = commit;
        let mut tx = self.pool.begin().await?;

        let updated = match self.demands.apply_transition(&mut *tx, &demand, expected_status).await? {
            Some(updated) => updated,
            None => {
                // Ninguém foi atualizado: a demanda sumiu ou outro pedido mudou o status antes
                let current = self
                    .demands
                    .find_by_id(&mut *tx, demand.id)
                    .await?
                    .ok_or(AppError::DemandNotFound(demand.id))?;
                tracing::warn!(
                    demand_id = %demand.id,
                    expected = %expected_status,
                    found = %current.status,
                    "Transição rejeitada: status mudou durante a operação"
                );
                return Err(AppError::InvalidState {
                    operation: "transition",
                    status: current.status,
                });
            }
        };

        let record = self.tramitacoes.insert(&mut tx, entry).await?;
        // Se as notificações falharem, a transição inteira é desfeita
        self.notifications.insert_many(&mut *tx, &notifications).await?;
        tx.commit().await?;

        Ok((updated, record))
    }

    async fn append_tramitacao(&self, entry: NewTramitacao) -> Result<Tramitacao, AppError> {
        let mut tx = self.pool.begin().await?;
        let record = self.tramitacoes.insert(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn list_tramitacoes(&self, demand_id: Uuid) -> Result<Vec<Tramitacao>, AppError> {
        self.tramitacoes.list_by_demand(demand_id).await
    }

    async fn overdue_candidates(&self) -> Result<Vec<OverdueCandidate>, AppError> {
        self.demands.overdue_candidates(&self.pool).await
    }

    async fn commit_overdue(&self, alerts: &[OverdueAlert]) -> Result<OverdueSweepReport, AppError> {
        if alerts.is_empty() {
            return Ok(OverdueSweepReport::default());
        }

        let demand_ids: Vec<Uuid> = alerts.iter().map(|a| a.demand_id).collect();
        let mut tx = self.pool.begin().await?;
        let latched = self.demands.latch_overdue(&mut *tx, &demand_ids).await?;

        let notifications: Vec<_> = alerts
            .iter()
            .filter(|a| latched.contains(&a.demand_id))
            .flat_map(|a| a.notifications.iter().cloned())
            .collect();
        let created = self.notifications.insert_many(&mut *tx, &notifications).await?;
        tx.commit().await?;

        if latched.len() < demand_ids.len() {
            tracing::warn!(
                skipped = demand_ids.len() - latched.len(),
                "Demandas já travadas por outra varredura; alertas descartados"
            );
        }

        Ok(OverdueSweepReport {
            demands_marked: latched.len(),
            notifications_created: created as usize,
        })
    }
}

#[async_trait]
impl NotificationStore for PgDemandStore {
    async fn list_for(&self, recipient_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, AppError> {
        self.notifications.list_for(recipient_id, unread_only).await
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, AppError> {
        self.notifications.mark_read(id, recipient_id).await
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, AppError> {
        self.notifications.mark_all_read(recipient_id).await
    }
}
