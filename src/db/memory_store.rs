// src/db/memory_store.rs
//
// Store em memória para os testes dos serviços. Reproduz as garantias que o
// Postgres dá ao `PgDemandStore`: unicidade dos protocolos, transição condicionada
// ao status anterior e gravação atômica (tudo sob o mesmo Mutex).

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{DemandStore, NotificationStore, OverdueAlert, OverdueCandidate, TransitionCommit},
    models::{
        auth::{Profile, User},
        catalog::{Department, Service, ServiceKind},
        demand::{Demand, DemandFilter, DemandStatus},
        notification::{NewNotification, Notification, OverdueSweepReport},
        tramitacao::{NewTramitacao, Tramitacao},
    },
    services::protocol_service::ProtocolKind,
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    departments: Vec<Department>,
    services: Vec<Service>,
    demands: HashMap<Uuid, Demand>,
    tramitacoes: Vec<Tramitacao>,
    notifications: Vec<Notification>,
    // Quantos commits com protocolo ainda devem falhar como se outro processo tivesse gravado antes
    forced_conflicts: u32,
    commit_attempts: u32,
    // Simula a tabela de notificações recusando gravações
    failing_notifications: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // --- Seeds ---

    pub fn add_department(&self, name: &str) -> Department {
        let department = Department {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.state().departments.push(department.clone());
        department
    }

    pub fn add_service(&self, name: &str, department_id: Uuid, deadline_days: Option<i32>) -> Service {
        let service = Service {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind: ServiceKind::Service,
            department_id,
            deadline_days,
        };
        self.state().services.push(service.clone());
        service
    }

    pub fn add_user(&self, username: &str, profile: Profile, department_id: Option<Uuid>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            full_name: username.to_string(),
            email: None,
            profile,
            department_id,
            job_title: None,
            phone: None,
            created_at: Utc::now(),
        };
        self.state().users.push(user.clone());
        user
    }

    /// Grava uma demanda já pronta, sem passar pelas regras (para montar cenários).
    pub fn put_demand(&self, demand: Demand) {
        self.state().demands.insert(demand.id, demand);
    }

    pub fn force_protocol_conflicts(&self, times: u32) {
        self.state().forced_conflicts = times;
    }

    pub fn fail_notification_writes(&self, failing: bool) {
        self.state().failing_notifications = failing;
    }

    pub fn put_notification(&self, notification: &NewNotification) -> Notification {
        let stored = to_notification(notification);
        self.state().notifications.push(stored.clone());
        stored
    }

    // --- Inspeção ---

    pub fn demand(&self, id: Uuid) -> Option<Demand> {
        self.state().demands.get(&id).cloned()
    }

    pub fn tramitacoes_of(&self, demand_id: Uuid) -> Vec<Tramitacao> {
        self.state()
            .tramitacoes
            .iter()
            .filter(|t| t.demand_id == demand_id)
            .cloned()
            .collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state().notifications.clone()
    }

    pub fn notifications_for(&self, recipient_id: Uuid) -> Vec<Notification> {
        self.state()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    pub fn commit_attempts(&self) -> u32 {
        self.state().commit_attempts
    }
}

fn protocol_taken(state: &State, demand: &Demand) -> Option<&'static str> {
    state.demands.values().filter(|other| other.id != demand.id).find_map(|other| {
        if demand.legislative_protocol.is_some() && other.legislative_protocol == demand.legislative_protocol {
            Some("demands_legislative_protocol_key")
        } else if demand.executive_protocol.is_some() && other.executive_protocol == demand.executive_protocol {
            Some("demands_executive_protocol_key")
        } else {
            None
        }
    })
}

fn to_notification(n: &NewNotification) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        recipient_id: n.recipient_id,
        message: n.message.clone(),
        link: n.link.clone(),
        read: false,
        kind: n.kind,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl DemandStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state().users.iter().find(|u| u.id == id).cloned())
    }

    async fn users_by_profile(&self, profile: Profile) -> Result<Vec<User>, AppError> {
        Ok(self.state().users.iter().filter(|u| u.profile == profile).cloned().collect())
    }

    async fn users_by_departments(&self, department_ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        Ok(self
            .state()
            .users
            .iter()
            .filter(|u| u.department_id.is_some_and(|d| department_ids.contains(&d)))
            .cloned()
            .collect())
    }

    async fn find_department(&self, id: Uuid) -> Result<Option<Department>, AppError> {
        Ok(self.state().departments.iter().find(|d| d.id == id).cloned())
    }

    async fn find_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        Ok(self.state().services.iter().find(|s| s.id == id).cloned())
    }

    async fn find_demand(&self, id: Uuid) -> Result<Option<Demand>, AppError> {
        Ok(self.demand(id))
    }

    async fn list_demands(&self, filter: &DemandFilter) -> Result<Vec<Demand>, AppError> {
        let mut demands: Vec<Demand> = self
            .state()
            .demands
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        demands.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(demands)
    }

    async fn insert_demand(&self, demand: &Demand) -> Result<Demand, AppError> {
        self.state().demands.insert(demand.id, demand.clone());
        Ok(demand.clone())
    }

    async fn update_demand_content(&self, demand: &Demand) -> Result<Demand, AppError> {
        let mut state = self.state();
        let stored = state
            .demands
            .get_mut(&demand.id)
            .ok_or(AppError::DemandNotFound(demand.id))?;

        let status = stored.status;
        let mut updated = demand.clone();
        // Só o conteúdo é gravado; o resto permanece como está no store
        updated.status = status;
        updated.legislative_protocol = stored.legislative_protocol.clone();
        updated.executive_protocol = stored.executive_protocol.clone();
        updated.destination_department_id = stored.destination_department_id;
        updated.deadline_started_at = stored.deadline_started_at;
        updated.finalized_at = stored.finalized_at;
        updated.overdue_notified = stored.overdue_notified;
        *stored = updated.clone();

        Ok(updated)
    }

    async fn delete_draft(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        let is_draft = state.demands.get(&id).is_some_and(|d| d.status == DemandStatus::Draft);
        if is_draft {
            state.demands.remove(&id);
            state.tramitacoes.retain(|t| t.demand_id != id);
        }
        Ok(is_draft)
    }

    async fn count_protocols(&self, kind: ProtocolKind, prefix: &str) -> Result<i64, AppError> {
        // Cede a vez para que tarefas concorrentes se intercalem entre a contagem e o commit
        tokio::task::yield_now().await;

        let total = self
            .state()
            .demands
            .values()
            .filter_map(|d| match kind {
                ProtocolKind::Legislative => d.legislative_protocol.as_deref(),
                ProtocolKind::Executive => d.executive_protocol.as_deref(),
            })
            .filter(|code| code.starts_with(prefix))
            .count();
        Ok(total as i64)
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<(Demand, Tramitacao), AppError> {
        tokio::task::yield_now().await;

        let TransitionCommit { demand, expected_status, entry, notifications } = commit;
        let mut state = self.state();
        state.commit_attempts += 1;

        let current = state
            .demands
            .get(&demand.id)
            .ok_or(AppError::DemandNotFound(demand.id))?;
        if current.status != expected_status {
            return Err(AppError::InvalidState {
                operation: "transition",
                status: current.status,
            });
        }

        let assigns_protocol = current.legislative_protocol != demand.legislative_protocol
            || current.executive_protocol != demand.executive_protocol;
        if assigns_protocol && state.forced_conflicts > 0 {
            state.forced_conflicts -= 1;
            return Err(AppError::ProtocolConflict("forced".to_string()));
        }
        if let Some(constraint) = protocol_taken(&state, &demand) {
            return Err(AppError::ProtocolConflict(constraint.to_string()));
        }
        // Nada foi gravado ainda: a falha desfaz a transição inteira, como o rollback do Postgres
        if state.failing_notifications && !notifications.is_empty() {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "insert into notifications failed"
            )));
        }

        let record = entry.into_record();
        state.demands.insert(demand.id, demand.clone());
        state.tramitacoes.push(record.clone());
        state.notifications.extend(notifications.iter().map(to_notification));

        Ok((demand, record))
    }

    async fn append_tramitacao(&self, entry: NewTramitacao) -> Result<Tramitacao, AppError> {
        let mut state = self.state();
        if !state.demands.contains_key(&entry.demand_id) {
            return Err(AppError::DemandNotFound(entry.demand_id));
        }
        let record = entry.into_record();
        state.tramitacoes.push(record.clone());
        Ok(record)
    }

    async fn list_tramitacoes(&self, demand_id: Uuid) -> Result<Vec<Tramitacao>, AppError> {
        let mut entries = self.tramitacoes_of(demand_id);
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn overdue_candidates(&self) -> Result<Vec<OverdueCandidate>, AppError> {
        let state = self.state();
        let mut candidates: Vec<OverdueCandidate> = state
            .demands
            .values()
            .filter(|d| d.status.is_in_progress() && !d.overdue_notified)
            .filter_map(|d| {
                let service = state.services.iter().find(|s| s.id == d.service_id)?;
                Some(OverdueCandidate {
                    demand_id: d.id,
                    title: d.title.clone(),
                    executive_protocol: d.executive_protocol.clone(),
                    destination_department_id: d.destination_department_id,
                    deadline_started_at: d.deadline_started_at?,
                    deadline_days: service.deadline_days?,
                })
            })
            .collect();
        candidates.sort_by_key(|c| c.deadline_started_at);
        Ok(candidates)
    }

    async fn commit_overdue(&self, alerts: &[OverdueAlert]) -> Result<OverdueSweepReport, AppError> {
        tokio::task::yield_now().await;

        let mut state = self.state();
        let mut report = OverdueSweepReport::default();
        for alert in alerts {
            // Mesma trava do UPDATE ... WHERE overdue_notified = FALSE
            let latched = match state.demands.get_mut(&alert.demand_id) {
                Some(demand) if !demand.overdue_notified => {
                    demand.overdue_notified = true;
                    true
                }
                _ => false,
            };
            if latched {
                report.demands_marked += 1;
                report.notifications_created += alert.notifications.len();
                state.notifications.extend(alert.notifications.iter().map(to_notification));
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn list_for(&self, recipient_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, AppError> {
        let mut notifications: Vec<Notification> = self
            .notifications_for(recipient_id)
            .into_iter()
            .filter(|n| !unread_only || !n.read)
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state();
        match state.notifications.iter_mut().find(|n| n.id == id && n.recipient_id == recipient_id) {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, AppError> {
        let mut state = self.state();
        let mut changed = 0;
        for n in state.notifications.iter_mut().filter(|n| n.recipient_id == recipient_id && !n.read) {
            n.read = true;
            changed += 1;
        }
        Ok(changed)
    }
}
