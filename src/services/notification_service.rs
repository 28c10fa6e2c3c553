// src/services/notification_service.rs

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use chrono::{Days, NaiveDate};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use uuid::Uuid;

use crate::{
    common::{clock::Clock, error::AppError},
    db::store::{DemandStore, NotificationStore, OverdueAlert, OverdueCandidate},
    models::{
        auth::{Profile, User},
        demand::{Demand, DemandStatus},
        notification::{NewNotification, Notification, NotificationKind, OverdueSweepReport},
    },
};

/// Destinatários de uma mudança de status, buscados antes do commit da transição.
#[derive(Debug, Clone, Default)]
pub struct StatusRecipients {
    pub intake: Vec<User>,
    pub department: Vec<User>,
}

/// Monta as notificações dos eventos do ciclo de vida. Não grava nada: o
/// orquestrador as entrega ao store junto com a transição.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn DemandStore>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn DemandStore>) -> Self {
        Self { store }
    }

    /// Quem deve ser avisado quando uma demanda entra em `status`.
    pub async fn recipients(
        &self,
        status: DemandStatus,
        destination: Option<Uuid>,
    ) -> Result<StatusRecipients, AppError> {
        let needs_intake = matches!(
            status,
            DemandStatus::AwaitingProtocol
                | DemandStatus::InExecution
                | DemandStatus::AwaitingTransfer
                | DemandStatus::Finalized
        );
        let intake = if needs_intake {
            self.store.users_by_profile(Profile::IntakeOffice).await?
        } else {
            Vec::new()
        };
        if needs_intake && intake.is_empty() {
            tracing::warn!(%status, "Nenhum usuário com perfil PROTOCOLO para notificar");
        }

        let department = match (status, destination) {
            (DemandStatus::Protocoled, Some(department_id)) => {
                self.store.users_by_departments(&[department_id]).await?
            }
            _ => Vec::new(),
        };

        Ok(StatusRecipients { intake, department })
    }

    /// Notificações da mudança `old -> demand.status`.
    pub fn plan(old: DemandStatus, demand: &Demand, recipients: &StatusRecipients) -> Vec<NewNotification> {
        if old == demand.status {
            return Vec::new();
        }
        status_notifications(demand, &recipients.intake, &recipients.department)
    }

    /// `recipients` + `plan`, para quando o novo estado já está montado.
    pub async fn planned(&self, old: DemandStatus, demand: &Demand) -> Result<Vec<NewNotification>, AppError> {
        if old == demand.status {
            return Ok(Vec::new());
        }
        let recipients = self.recipients(demand.status, demand.destination_department_id).await?;
        Ok(Self::plan(old, demand, &recipients))
    }

    /// Marca e notifica as demandas em andamento cujo prazo venceu antes de `as_of`.
    /// Cada demanda é notificada uma única vez (a flag `overdue_notified` é a trava).
    pub async fn run_overdue_sweep(&self, as_of: NaiveDate) -> Result<OverdueSweepReport, AppError> {
        let candidates = self.store.overdue_candidates().await?;
        tracing::info!(%as_of, candidates = candidates.len(), "Iniciando verificação de demandas atrasadas");

        let overdue: Vec<OverdueCandidate> = candidates.into_iter().filter(|c| is_overdue(c, as_of)).collect();
        if overdue.is_empty() {
            return Ok(OverdueSweepReport::default());
        }

        // Uma consulta por perfil e uma única consulta para todas as secretarias envolvidas
        let intake_users = self.store.users_by_profile(Profile::IntakeOffice).await?;
        let managers = self.store.users_by_profile(Profile::Manager).await?;
        let department_ids: Vec<Uuid> = overdue
            .iter()
            .filter_map(|c| c.destination_department_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let department_users = self.store.users_by_departments(&department_ids).await?;

        let mut by_department: HashMap<Uuid, Vec<&User>> = HashMap::new();
        for user in &department_users {
            if let Some(department_id) = user.department_id {
                by_department.entry(department_id).or_default().push(user);
            }
        }

        let mut alerts = Vec::with_capacity(overdue.len());
        for candidate in &overdue {
            let protocol = candidate
                .executive_protocol
                .clone()
                .unwrap_or_else(|| candidate.demand_id.to_string());
            let message = format!("Alerta: A demanda nº {protocol} ({}) está atrasada.", candidate.title);
            let link = format!("/demandas/detalhes/{}", candidate.demand_id);

            let department = candidate
                .destination_department_id
                .and_then(|d| by_department.get(&d))
                .map(|users| users.as_slice())
                .unwrap_or(&[]);

            // Um usuário em mais de um grupo recebe um único alerta por demanda
            let mut notified = HashSet::new();
            let mut notifications = Vec::new();
            let recipients = department.iter().copied().chain(intake_users.iter()).chain(managers.iter());
            for user in recipients {
                if notified.insert(user.id) {
                    notifications.push(NewNotification {
                        recipient_id: user.id,
                        message: message.clone(),
                        link: link.clone(),
                        kind: NotificationKind::Overdue,
                    });
                }
            }
            alerts.push(OverdueAlert {
                demand_id: candidate.demand_id,
                notifications,
            });
        }

        // Outra varredura pode ter travado parte delas; o store só grava o que travou aqui
        let report = self.store.commit_overdue(&alerts).await?;
        tracing::info!(
            demands_marked = report.demands_marked,
            notifications_created = report.notifications_created,
            "Verificação de atrasos concluída"
        );
        Ok(report)
    }
}

fn is_overdue(candidate: &OverdueCandidate, as_of: NaiveDate) -> bool {
    let start = candidate.deadline_started_at.date_naive();
    let days = u64::try_from(candidate.deadline_days).unwrap_or(0);
    match start.checked_add_days(Days::new(days)) {
        Some(due) => as_of > due,
        None => false,
    }
}

fn protocol_or_id(protocol: &Option<String>, demand: &Demand) -> String {
    protocol.clone().unwrap_or_else(|| demand.id.to_string())
}

// Monta as notificações de uma transição; pares (destinatário, mensagem) repetidos saem uma vez só.
fn status_notifications(demand: &Demand, intake_users: &[User], department_users: &[User]) -> Vec<NewNotification> {
    let legislative = protocol_or_id(&demand.legislative_protocol, demand);
    let executive = protocol_or_id(&demand.executive_protocol, demand);

    let mut planned: Vec<(Uuid, String)> = Vec::new();
    let kind = match demand.status {
        DemandStatus::AwaitingProtocol => {
            let message = format!("Novo ofício nº {legislative} aguardando protocolo.");
            planned.extend(intake_users.iter().map(|u| (u.id, message.clone())));
            NotificationKind::NewRequest
        }
        DemandStatus::Protocoled => {
            planned.push((
                demand.author_id,
                format!("Seu ofício nº {legislative} foi protocolado (nº {executive}) e despachado."),
            ));
            let message = format!("Nova demanda (protocolo nº {executive}) foi enviada para sua secretaria.");
            planned.extend(department_users.iter().map(|u| (u.id, message.clone())));
            NotificationKind::Dispatch
        }
        DemandStatus::InExecution => {
            planned.push((
                demand.author_id,
                format!("A execução da sua demanda (protocolo nº {executive}) foi iniciada."),
            ));
            let message = format!("A demanda nº {executive} teve sua execução iniciada.");
            planned.extend(intake_users.iter().map(|u| (u.id, message.clone())));
            NotificationKind::Update
        }
        DemandStatus::AwaitingTransfer => {
            let message = format!("Transferência solicitada para a demanda nº {executive}.");
            planned.extend(intake_users.iter().map(|u| (u.id, message.clone())));
            NotificationKind::Transfer
        }
        DemandStatus::Finalized => {
            planned.push((demand.author_id, format!("A sua demanda (protocolo nº {executive}) foi concluída.")));
            let message = format!("A demanda nº {executive} foi marcada como concluída.");
            planned.extend(intake_users.iter().map(|u| (u.id, message.clone())));
            NotificationKind::Conclusion
        }
        DemandStatus::Draft | DemandStatus::Cancelled => return Vec::new(),
    };

    let link = demand.link();
    let mut seen = HashSet::new();
    planned
        .into_iter()
        .filter(|pair| seen.insert(pair.clone()))
        .map(|(recipient_id, message)| NewNotification {
            recipient_id,
            message,
            link: link.clone(),
            kind,
        })
        .collect()
}

/// Agenda a varredura de atrasos dentro do processo.
pub fn spawn_overdue_sweep(
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let today = clock.now().date_naive();
            if let Err(e) = dispatcher.run_overdue_sweep(today).await {
                tracing::error!(error = ?e, "Falha na verificação de atrasos");
            }
        }
    })
}

// --- Caixa de entrada ---

#[derive(Clone)]
pub struct NotificationService {
    sink: Arc<dyn NotificationStore>,
}

impl NotificationService {
    pub fn new(sink: Arc<dyn NotificationStore>) -> Self {
        Self { sink }
    }

    pub async fn list(&self, user: &User, unread_only: bool) -> Result<Vec<Notification>, AppError> {
        self.sink.list_for(user.id, unread_only).await
    }

    pub async fn mark_read(&self, user: &User, id: Uuid) -> Result<(), AppError> {
        if self.sink.mark_read(id, user.id).await? {
            Ok(())
        } else {
            Err(AppError::NotificationNotFound(id))
        }
    }

    pub async fn mark_all_read(&self, user: &User) -> Result<u64, AppError> {
        self.sink.mark_all_read(user.id).await
    }
}
