// src/services/tramitacao_service.rs

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    common::{clock::Clock, error::AppError},
    db::store::DemandStore,
    models::{
        auth::User,
        tramitacao::{NewTramitacao, Tramitacao, TramitacaoKind},
    },
    services::rbac_service::{ensure_allowed, DemandOperation},
};

// Lançamento manual no histórico (comentário, análise técnica, agendamento...)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualEntryRequest {
    pub kind: TramitacaoKind,
    #[validate(length(min = 1, message = "A descrição é obrigatória."))]
    #[schema(example = "Vistoria técnica agendada para a próxima semana.")]
    pub description: String,
    // Caminhos dos arquivos já armazenados
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Clone)]
pub struct TramitacaoService {
    store: Arc<dyn DemandStore>,
    clock: Arc<dyn Clock>,
}

impl TramitacaoService {
    pub fn new(store: Arc<dyn DemandStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Lança uma entrada avulsa no histórico da demanda.
    pub async fn record(
        &self,
        demand_id: Uuid,
        actor: Option<&User>,
        kind: TramitacaoKind,
        description: impl Into<String>,
        attachments: Vec<String>,
    ) -> Result<Tramitacao, AppError> {
        let entry = NewTramitacao::new(demand_id, actor.map(|u| u.id), kind, description, self.clock.now())
            .with_attachments(attachments);
        self.store.append_tramitacao(entry).await
    }

    pub async fn history(&self, demand_id: Uuid) -> Result<Vec<Tramitacao>, AppError> {
        if self.store.find_demand(demand_id).await?.is_none() {
            return Err(AppError::DemandNotFound(demand_id));
        }
        self.store.list_tramitacoes(demand_id).await
    }

    pub async fn add_manual_entry(
        &self,
        demand_id: Uuid,
        actor: &User,
        request: ManualEntryRequest,
    ) -> Result<Tramitacao, AppError> {
        ensure_allowed(actor, DemandOperation::AddHistoryEntry)?;
        request.validate()?;

        // Os tipos de transição só são gravados pelo orquestrador
        if request.kind.is_transition_kind() {
            return Err(AppError::Forbidden(format!("tramitação do tipo {}", request.kind.label())));
        }
        if self.store.find_demand(demand_id).await?.is_none() {
            return Err(AppError::DemandNotFound(demand_id));
        }

        let entry = self
            .record(demand_id, Some(actor), request.kind, request.description, request.attachments)
            .await?;
        tracing::info!(demand_id = %demand_id, kind = entry.kind.label(), "Tramitação manual registrada");
        Ok(entry)
    }
}
