// src/services/demand_service.rs

use std::sync::Arc;

use chrono::Datelike;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{clock::Clock, error::AppError},
    db::store::{DemandStore, TransitionCommit},
    models::{
        auth::User,
        demand::{Demand, DemandContent, DemandFilter, DemandPatch, DemandStatus, TransferAck},
        tramitacao::{NewTramitacao, TramitacaoKind},
    },
    services::{
        notification_service::NotificationDispatcher,
        protocol_service::{ProtocolAllocator, ProtocolKind},
        rbac_service::{ensure_allowed, DemandOperation},
    },
};

/// Orquestrador do ciclo de vida da demanda.
///
/// Toda transição segue o mesmo roteiro: política de acesso, pré-condições,
/// cálculo do novo estado e das notificações, e gravação atômica de tudo
/// (demanda, tramitação e notificações).
#[derive(Clone)]
pub struct DemandService {
    store: Arc<dyn DemandStore>,
    allocator: ProtocolAllocator,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl DemandService {
    pub fn new(
        store: Arc<dyn DemandStore>,
        allocator: ProtocolAllocator,
        dispatcher: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, allocator, dispatcher, clock }
    }

    async fn load(&self, id: Uuid) -> Result<Demand, AppError> {
        self.store.find_demand(id).await?.ok_or(AppError::DemandNotFound(id))
    }

    // --- Rascunhos ---

    pub async fn create_draft(&self, actor: &User, content: DemandContent) -> Result<Demand, AppError> {
        ensure_allowed(actor, DemandOperation::CreateDraft)?;
        content.validate()?;
        if self.store.find_service(content.service_id).await?.is_none() {
            return Err(AppError::ServiceNotFound(content.service_id));
        }

        let demand = Demand::new_draft(actor.id, content, self.clock.now());
        let created = self.store.insert_demand(&demand).await?;
        tracing::info!(demand_id = %created.id, author_id = %actor.id, "Rascunho criado");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Demand, AppError> {
        self.load(id).await
    }

    pub async fn list(&self, filter: &DemandFilter) -> Result<Vec<Demand>, AppError> {
        self.store.list_demands(filter).await
    }

    /// Edição completa: só enquanto for rascunho.
    pub async fn replace_draft(&self, id: Uuid, actor: &User, content: DemandContent) -> Result<Demand, AppError> {
        ensure_allowed(actor, DemandOperation::EditDraft)?;
        content.validate()?;
        let mut demand = self.load(id).await?;
        if demand.status != DemandStatus::Draft {
            return Err(AppError::InvalidState {
                operation: "edit",
                status: demand.status,
            });
        }
        if self.store.find_service(content.service_id).await?.is_none() {
            return Err(AppError::ServiceNotFound(content.service_id));
        }

        demand.replace_content(content);
        self.store.update_demand_content(&demand).await
    }

    /// Edição parcial: permitida em qualquer status.
    pub async fn patch(&self, id: Uuid, actor: &User, patch: DemandPatch) -> Result<Demand, AppError> {
        ensure_allowed(actor, DemandOperation::Patch)?;
        patch.validate()?;
        let mut demand = self.load(id).await?;
        demand.apply_patch(patch);
        self.store.update_demand_content(&demand).await
    }

    pub async fn delete_draft(&self, id: Uuid, actor: &User) -> Result<(), AppError> {
        ensure_allowed(actor, DemandOperation::DeleteDraft)?;
        let demand = self.load(id).await?;
        if demand.status != DemandStatus::Draft {
            return Err(AppError::InvalidState {
                operation: "delete",
                status: demand.status,
            });
        }

        if !self.store.delete_draft(id).await? {
            // Enviada entre a leitura e o DELETE
            let current = self.load(id).await?;
            return Err(AppError::InvalidState {
                operation: "delete",
                status: current.status,
            });
        }
        tracing::info!(demand_id = %id, "Rascunho excluído");
        Ok(())
    }

    // --- Transições ---

    /// Envio oficial: gera o protocolo do legislativo e encaminha para o Protocolo.
    pub async fn submit(&self, id: Uuid, actor: &User) -> Result<Demand, AppError> {
        ensure_allowed(actor, DemandOperation::Submit)?;
        let demand = self.load(id).await?;
        if demand.status != DemandStatus::Draft {
            return Err(AppError::AlreadySubmitted);
        }
        let service = self
            .store
            .find_service(demand.service_id)
            .await?
            .ok_or(AppError::ServiceNotFound(demand.service_id))?;

        let recipients = self
            .dispatcher
            .recipients(DemandStatus::AwaitingProtocol, Some(service.department_id))
            .await?;
        let now = self.clock.now();
        let build = |code: &str| {
            let mut next = demand.clone();
            next.legislative_protocol = Some(code.to_string());
            next.destination_department_id = Some(service.department_id);
            next.enter_status(DemandStatus::AwaitingProtocol, now);
            TransitionCommit {
                notifications: NotificationDispatcher::plan(demand.status, &next, &recipients),
                entry: NewTramitacao::new(
                    id,
                    Some(actor.id),
                    TramitacaoKind::OfficialSubmission,
                    format!("Demanda enviada oficialmente. Protocolo do Legislativo gerado: {code}."),
                    now,
                ),
                demand: next,
                expected_status: DemandStatus::Draft,
            }
        };

        let (saved, _) = match self
            .allocator
            .commit_with_protocol(self.store.as_ref(), ProtocolKind::Legislative, now.year(), build)
            .await
        {
            // Outro envio chegou primeiro
            Err(AppError::InvalidState { .. }) => return Err(AppError::AlreadySubmitted),
            other => other?,
        };

        tracing::info!(demand_id = %id, protocol = ?saved.legislative_protocol, "Demanda enviada ao Protocolo");
        Ok(saved)
    }

    /// Despacho: gera o protocolo do executivo e encaminha para a secretaria escolhida.
    pub async fn dispatch(
        &self,
        id: Uuid,
        actor: &User,
        department_id: Option<Uuid>,
        external_ref: Option<String>,
    ) -> Result<Demand, AppError> {
        ensure_allowed(actor, DemandOperation::Dispatch)?;
        let demand = self.load(id).await?;
        if demand.status != DemandStatus::AwaitingProtocol {
            return Err(AppError::InvalidState {
                operation: "dispatch",
                status: demand.status,
            });
        }
        let department_id = department_id.ok_or(AppError::MissingDepartmentId)?;
        let department = self
            .store
            .find_department(department_id)
            .await?
            .ok_or(AppError::DepartmentNotFound(department_id))?;

        let external_ref = external_ref.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let recipients = self
            .dispatcher
            .recipients(DemandStatus::Protocoled, Some(department.id))
            .await?;
        let now = self.clock.now();
        let build = |code: &str| {
            let mut next = demand.clone();
            next.executive_protocol = Some(code.to_string());
            next.destination_department_id = Some(department.id);
            next.enter_status(DemandStatus::Protocoled, now);

            let mut description = format!(
                "Demanda despachada para a secretaria: {}. Protocolo do Executivo gerado: {code}.",
                department.name
            );
            if let Some(reference) = &external_ref {
                description.push_str(&format!(" Referência externa: {reference}."));
            }

            TransitionCommit {
                notifications: NotificationDispatcher::plan(demand.status, &next, &recipients),
                entry: NewTramitacao::new(id, Some(actor.id), TramitacaoKind::Dispatch, description, now),
                demand: next,
                expected_status: DemandStatus::AwaitingProtocol,
            }
        };

        let (saved, _) = self
            .allocator
            .commit_with_protocol(self.store.as_ref(), ProtocolKind::Executive, now.year(), build)
            .await?;

        tracing::info!(
            demand_id = %id,
            protocol = ?saved.executive_protocol,
            department = %department.name,
            "Demanda despachada"
        );
        Ok(saved)
    }

    /// Atualização manual (EM_EXECUCAO ou FINALIZADO).
    pub async fn update_status(&self, id: Uuid, actor: &User, new_status: &str) -> Result<Demand, AppError> {
        ensure_allowed(actor, DemandOperation::UpdateStatus)?;
        let demand = self.load(id).await?;

        let target = DemandStatus::parse_code(new_status)
            .filter(|s| DemandStatus::MANUAL_TARGETS.contains(s))
            .ok_or_else(|| AppError::InvalidStatus(new_status.to_string()))?;
        if !demand.status.can_update_to(target) {
            return Err(AppError::InvalidState {
                operation: "update_status",
                status: demand.status,
            });
        }

        let now = self.clock.now();
        let mut next = demand.clone();
        next.enter_status(target, now);
        let description = format!(
            "Status alterado de \"{}\" para \"{}\".",
            demand.status.label(),
            target.label()
        );
        let notifications = self.dispatcher.planned(demand.status, &next).await?;

        let (saved, _) = self
            .store
            .commit_transition(TransitionCommit {
                notifications,
                entry: NewTramitacao::new(id, Some(actor.id), TramitacaoKind::StatusUpdate, description, now),
                demand: next,
                expected_status: demand.status,
            })
            .await?;

        tracing::info!(demand_id = %id, from = %demand.status, to = %saved.status, "Status atualizado");
        Ok(saved)
    }

    /// A secretaria de destino devolve a demanda ao Protocolo.
    pub async fn request_transfer(&self, id: Uuid, actor: &User) -> Result<TransferAck, AppError> {
        ensure_allowed(actor, DemandOperation::RequestTransfer)?;
        let demand = self.load(id).await?;

        let is_destination = actor.department_id.is_some() && actor.department_id == demand.destination_department_id;
        if !is_destination {
            tracing::warn!(demand_id = %id, user_id = %actor.id, "Transferência pedida por secretaria que não é a de destino");
            return Err(AppError::Forbidden("apenas a secretaria de destino".to_string()));
        }
        if !demand.status.can_request_transfer() {
            return Err(AppError::InvalidState {
                operation: "request_transfer",
                status: demand.status,
            });
        }

        let department_name = self.department_name(demand.destination_department_id).await?;
        let now = self.clock.now();
        let mut next = demand.clone();
        next.enter_status(DemandStatus::AwaitingTransfer, now);
        let notifications = self.dispatcher.planned(demand.status, &next).await?;

        let (saved, _) = self
            .store
            .commit_transition(TransitionCommit {
                notifications,
                entry: NewTramitacao::new(
                    id,
                    Some(actor.id),
                    TramitacaoKind::Transfer,
                    format!("A secretaria {department_name} solicitou a transferência desta demanda."),
                    now,
                ),
                demand: next,
                expected_status: demand.status,
            })
            .await?;

        tracing::info!(demand_id = %id, department = %department_name, "Transferência solicitada");
        Ok(TransferAck {
            demand_id: id,
            status: saved.status,
            message: "Solicitação de transferência enviada para o Protocolo.".to_string(),
        })
    }

    /// O Protocolo aprova a transferência e redireciona a demanda.
    pub async fn approve_transfer(
        &self,
        id: Uuid,
        actor: &User,
        new_department_id: Option<Uuid>,
    ) -> Result<TransferAck, AppError> {
        ensure_allowed(actor, DemandOperation::ApproveTransfer)?;
        let demand = self.load(id).await?;
        if demand.status != DemandStatus::AwaitingTransfer {
            return Err(AppError::InvalidState {
                operation: "approve_transfer",
                status: demand.status,
            });
        }
        let new_department_id = new_department_id.ok_or(AppError::MissingDepartmentId)?;
        let new_department = self
            .store
            .find_department(new_department_id)
            .await?
            .ok_or(AppError::DepartmentNotFound(new_department_id))?;
        let old_name = self.department_name(demand.destination_department_id).await?;

        let now = self.clock.now();
        let mut next = demand.clone();
        next.destination_department_id = Some(new_department.id);
        next.enter_status(DemandStatus::Protocoled, now);
        let notifications = self.dispatcher.planned(demand.status, &next).await?;

        let (saved, _) = self
            .store
            .commit_transition(TransitionCommit {
                notifications,
                entry: NewTramitacao::new(
                    id,
                    Some(actor.id),
                    TramitacaoKind::Transfer,
                    format!(
                        "Transferência aprovada. Demanda movida da secretaria {old_name} para {}.",
                        new_department.name
                    ),
                    now,
                ),
                demand: next,
                expected_status: DemandStatus::AwaitingTransfer,
            })
            .await?;

        tracing::info!(demand_id = %id, from = %old_name, to = %new_department.name, "Transferência aprovada");
        Ok(TransferAck {
            demand_id: id,
            status: saved.status,
            message: format!("Demanda transferida para {}.", new_department.name),
        })
    }

    async fn department_name(&self, department_id: Option<Uuid>) -> Result<String, AppError> {
        let Some(department_id) = department_id else {
            return Ok("-".to_string());
        };
        Ok(self
            .store
            .find_department(department_id)
            .await?
            .map(|d| d.name)
            .unwrap_or_else(|| department_id.to_string()))
    }
}
