// src/models/tramitacao.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "tramitacao_kind")]
pub enum TramitacaoKind {
    #[serde(rename = "ENVIO_OFICIAL")]
    #[sqlx(rename = "ENVIO_OFICIAL")]
    OfficialSubmission,
    #[serde(rename = "DESPACHO")]
    #[sqlx(rename = "DESPACHO")]
    Dispatch,
    #[serde(rename = "STATUS_UPDATE")]
    #[sqlx(rename = "STATUS_UPDATE")]
    StatusUpdate,
    #[serde(rename = "COMENTARIO")]
    #[sqlx(rename = "COMENTARIO")]
    Comment,
    #[serde(rename = "ANALISE_TECNICA")]
    #[sqlx(rename = "ANALISE_TECNICA")]
    TechnicalReview,
    #[serde(rename = "ATRASO")]
    #[sqlx(rename = "ATRASO")]
    DelayRecord,
    #[serde(rename = "TRANSFERENCIA")]
    #[sqlx(rename = "TRANSFERENCIA")]
    Transfer,
    #[serde(rename = "CONCLUSAO")]
    #[sqlx(rename = "CONCLUSAO")]
    Conclusion,
    #[serde(rename = "AGENDAMENTO")]
    #[sqlx(rename = "AGENDAMENTO")]
    Scheduling,
}

impl TramitacaoKind {
    pub fn label(&self) -> &'static str {
        match self {
            TramitacaoKind::OfficialSubmission => "Envio Oficial",
            TramitacaoKind::Dispatch => "Despacho para Secretaria",
            TramitacaoKind::StatusUpdate => "Atualização de Status",
            TramitacaoKind::Comment => "Comentário",
            TramitacaoKind::TechnicalReview => "Análise Técnica",
            TramitacaoKind::DelayRecord => "Registro de Atraso",
            TramitacaoKind::Transfer => "Transferência",
            TramitacaoKind::Conclusion => "Conclusão do Serviço",
            TramitacaoKind::Scheduling => "Agendamento",
        }
    }

    /// Tipos reservados às transições de status; não podem ser lançados à mão.
    pub fn is_transition_kind(&self) -> bool {
        matches!(
            self,
            TramitacaoKind::OfficialSubmission
                | TramitacaoKind::Dispatch
                | TramitacaoKind::StatusUpdate
                | TramitacaoKind::Transfer
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TramitacaoAttachment {
    pub id: Uuid,
    pub tramitacao_id: Uuid,
    #[schema(example = "anexos_tramitacao/2026/03/01/laudo.pdf")]
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tramitacao {
    pub id: Uuid,
    pub demand_id: Uuid,
    // Nulo para ações do sistema ou usuário removido
    pub actor_id: Option<Uuid>,
    pub kind: TramitacaoKind,
    #[schema(example = "Demanda enviada oficialmente. Protocolo do Legislativo gerado: OFICIO-2026-0001.")]
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub attachments: Vec<TramitacaoAttachment>,
}

// O lançamento ainda não gravado.
#[derive(Debug, Clone)]
pub struct NewTramitacao {
    pub id: Uuid,
    pub demand_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub kind: TramitacaoKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub attachments: Vec<String>,
}

impl NewTramitacao {
    pub fn new(
        demand_id: Uuid,
        actor_id: Option<Uuid>,
        kind: TramitacaoKind,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            demand_id,
            actor_id,
            kind,
            description: description.into(),
            created_at,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn into_record(self) -> Tramitacao {
        let attachments = self
            .attachments
            .into_iter()
            .map(|file_path| TramitacaoAttachment {
                id: Uuid::new_v4(),
                tramitacao_id: self.id,
                file_path,
            })
            .collect();

        Tramitacao {
            id: self.id,
            demand_id: self.demand_id,
            actor_id: self.actor_id,
            kind: self.kind,
            description: self.description,
            created_at: self.created_at,
            attachments,
        }
    }
}
