// src/models/demand.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

// --- Status ---
// O ciclo de vida do ofício. Os valores de banco/JSON seguem os códigos já usados pelo legislativo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "demand_status")]
pub enum DemandStatus {
    #[serde(rename = "RASCUNHO")]
    #[sqlx(rename = "RASCUNHO")]
    Draft,
    #[serde(rename = "AGUARDANDO_PROTOCOLO")]
    #[sqlx(rename = "AGUARDANDO_PROTOCOLO")]
    AwaitingProtocol,
    #[serde(rename = "PROTOCOLADO")]
    #[sqlx(rename = "PROTOCOLADO")]
    Protocoled,
    #[serde(rename = "EM_EXECUCAO")]
    #[sqlx(rename = "EM_EXECUCAO")]
    InExecution,
    #[serde(rename = "AGUARDANDO_TRANSFERENCIA")]
    #[sqlx(rename = "AGUARDANDO_TRANSFERENCIA")]
    AwaitingTransfer,
    #[serde(rename = "FINALIZADO")]
    #[sqlx(rename = "FINALIZADO")]
    Finalized,
    #[serde(rename = "CANCELADO")]
    #[sqlx(rename = "CANCELADO")]
    Cancelled,
}

impl DemandStatus {
    pub const ALL: [DemandStatus; 7] = [
        DemandStatus::Draft,
        DemandStatus::AwaitingProtocol,
        DemandStatus::Protocoled,
        DemandStatus::InExecution,
        DemandStatus::AwaitingTransfer,
        DemandStatus::Finalized,
        DemandStatus::Cancelled,
    ];

    /// Status em que o prazo do serviço está correndo.
    pub const IN_PROGRESS: [DemandStatus; 3] = [
        DemandStatus::Protocoled,
        DemandStatus::InExecution,
        DemandStatus::AwaitingTransfer,
    ];

    /// Destinos aceitos pela atualização manual de status.
    pub const MANUAL_TARGETS: [DemandStatus; 2] = [DemandStatus::InExecution, DemandStatus::Finalized];

    pub fn code(&self) -> &'static str {
        match self {
            DemandStatus::Draft => "RASCUNHO",
            DemandStatus::AwaitingProtocol => "AGUARDANDO_PROTOCOLO",
            DemandStatus::Protocoled => "PROTOCOLADO",
            DemandStatus::InExecution => "EM_EXECUCAO",
            DemandStatus::AwaitingTransfer => "AGUARDANDO_TRANSFERENCIA",
            DemandStatus::Finalized => "FINALIZADO",
            DemandStatus::Cancelled => "CANCELADO",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DemandStatus::Draft => "Rascunho",
            DemandStatus::AwaitingProtocol => "Aguardando Protocolo",
            DemandStatus::Protocoled => "Protocolado e Despachado",
            DemandStatus::InExecution => "Em Execução",
            DemandStatus::AwaitingTransfer => "Aguardando Transferência",
            DemandStatus::Finalized => "Finalizado",
            DemandStatus::Cancelled => "Cancelado",
        }
    }

    /// Converte o código recebido da API, sem diferenciar maiúsculas.
    pub fn parse_code(raw: &str) -> Option<DemandStatus> {
        let wanted = raw.trim().to_uppercase();
        Self::ALL.into_iter().find(|s| s.code() == wanted)
    }

    pub fn is_in_progress(&self) -> bool {
        Self::IN_PROGRESS.contains(self)
    }

    /// Status que já passaram pelo despacho (exigem protocolo do executivo e secretaria de destino).
    pub fn is_dispatched(&self) -> bool {
        !matches!(self, DemandStatus::Draft | DemandStatus::AwaitingProtocol)
    }

    /// Regra da atualização manual: só a partir de uma demanda despachada e ativa,
    /// nunca para o mesmo status.
    pub fn can_update_to(&self, target: DemandStatus) -> bool {
        Self::MANUAL_TARGETS.contains(&target)
            && matches!(self, DemandStatus::Protocoled | DemandStatus::InExecution)
            && *self != target
    }

    /// Transferência só pode ser pedida enquanto a secretaria está com a demanda.
    pub fn can_request_transfer(&self) -> bool {
        matches!(self, DemandStatus::Protocoled | DemandStatus::InExecution)
    }
}

impl std::fmt::Display for DemandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// --- Demanda ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Demand {
    pub id: Uuid,
    #[schema(example = "OFICIO-2026-0001")]
    pub legislative_protocol: Option<String>,
    #[schema(example = "2026-0001")]
    pub executive_protocol: Option<String>,
    #[schema(example = "Buraco na Rua das Flores")]
    pub title: String,
    pub description: String,
    #[schema(example = "08710-000")]
    pub postal_code: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    #[schema(example = "-23.522500")]
    pub latitude: Option<Decimal>,
    #[schema(example = "-46.188300")]
    pub longitude: Option<Decimal>,
    pub status: DemandStatus,
    pub author_id: Uuid,
    pub service_id: Uuid,
    pub destination_department_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub deadline_started_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub overdue_notified: bool,
}

impl Demand {
    pub fn new_draft(author_id: Uuid, content: DemandContent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            legislative_protocol: None,
            executive_protocol: None,
            title: content.title,
            description: content.description,
            postal_code: content.postal_code,
            street: content.street,
            number: content.number,
            complement: content.complement,
            neighborhood: content.neighborhood,
            latitude: content.latitude,
            longitude: content.longitude,
            status: DemandStatus::Draft,
            author_id,
            service_id: content.service_id,
            destination_department_id: None,
            created_at: now,
            deadline_started_at: None,
            finalized_at: None,
            overdue_notified: false,
        }
    }

    /// Move a demanda para `next`, aplicando os efeitos de relógio:
    /// a primeira entrada em PROTOCOLADO inicia o prazo (reentradas preservam a data)
    /// e FINALIZADO registra a data de finalização.
    pub fn enter_status(&mut self, next: DemandStatus, now: DateTime<Utc>) {
        if next == DemandStatus::Protocoled
            && self.status != DemandStatus::Protocoled
            && self.deadline_started_at.is_none()
        {
            self.deadline_started_at = Some(now);
        }
        if next == DemandStatus::Finalized {
            self.finalized_at = Some(now);
        }
        self.status = next;
    }

    /// Protocolo legislativo existe sse saiu do rascunho; protocolo executivo e
    /// secretaria de destino existem a partir do despacho.
    pub fn protocol_invariants_hold(&self) -> bool {
        let legislative_ok = (self.status == DemandStatus::Draft) == self.legislative_protocol.is_none();
        let executive_ok = self.status.is_dispatched() == self.executive_protocol.is_some();
        let destination_ok = !self.status.is_dispatched() || self.destination_department_id.is_some();
        legislative_ok && executive_ok && destination_ok
    }

    pub fn link(&self) -> String {
        format!("/demandas/detalhes/{}", self.id)
    }

    pub fn replace_content(&mut self, content: DemandContent) {
        self.title = content.title;
        self.description = content.description;
        self.postal_code = content.postal_code;
        self.street = content.street;
        self.number = content.number;
        self.complement = content.complement;
        self.neighborhood = content.neighborhood;
        self.latitude = content.latitude;
        self.longitude = content.longitude;
        self.service_id = content.service_id;
    }

    pub fn apply_patch(&mut self, patch: DemandPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        // `null` limpa o campo; ausência mantém o valor atual
        if let Some(postal_code) = patch.postal_code {
            self.postal_code = postal_code;
        }
        if let Some(street) = patch.street {
            self.street = street;
        }
        if let Some(number) = patch.number {
            self.number = number;
        }
        if let Some(complement) = patch.complement {
            self.complement = complement;
        }
        if let Some(neighborhood) = patch.neighborhood {
            self.neighborhood = neighborhood;
        }
        if let Some(latitude) = patch.latitude {
            self.latitude = latitude;
        }
        if let Some(longitude) = patch.longitude {
            self.longitude = longitude;
        }
    }
}

fn check_coordinates(latitude: Option<Decimal>, longitude: Option<Decimal>) -> Result<(), ValidationError> {
    let lat_ok = latitude.is_none_or(|lat| lat.abs() <= Decimal::from(90));
    let lon_ok = longitude.is_none_or(|lon| lon.abs() <= Decimal::from(180));
    if lat_ok && lon_ok {
        return Ok(());
    }
    let mut err = ValidationError::new("coordenadas");
    err.message = Some("Latitude deve estar entre -90 e 90 e longitude entre -180 e 180.".into());
    Err(err)
}

fn validate_content_coordinates(content: &DemandContent) -> Result<(), ValidationError> {
    check_coordinates(content.latitude, content.longitude)
}

fn validate_patch_coordinates(patch: &DemandPatch) -> Result<(), ValidationError> {
    check_coordinates(patch.latitude.flatten(), patch.longitude.flatten())
}

// Campos editáveis de uma demanda (criação e edição completa).
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_content_coordinates"))]
pub struct DemandContent {
    #[validate(length(min = 1, max = 200, message = "O título deve ter entre 1 e 200 caracteres."))]
    #[schema(example = "Buraco na Rua das Flores")]
    pub title: String,
    #[validate(length(min = 1, message = "A descrição é obrigatória."))]
    #[schema(example = "Buraco de grandes proporções em frente ao número 120.")]
    pub description: String,
    pub service_id: Uuid,
    pub postal_code: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

// Edição parcial: só os campos enviados são alterados.
// O serviço não entra aqui, pois define o roteamento da demanda.
// Nos campos opcionais, `null` explícito apaga o valor.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_patch_coordinates"))]
pub struct DemandPatch {
    #[validate(length(min = 1, max = 200, message = "O título deve ter entre 1 e 200 caracteres."))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "A descrição é obrigatória."))]
    pub description: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub postal_code: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub street: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub number: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub complement: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub neighborhood: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<f64>, nullable)]
    pub latitude: Option<Option<Decimal>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<f64>, nullable)]
    pub longitude: Option<Option<Decimal>>,
}

// Filtros da listagem
#[derive(Debug, Clone, Default)]
pub struct DemandFilter {
    pub status: Option<DemandStatus>,
    pub status_in: Vec<DemandStatus>,
    pub status_exclude: Option<DemandStatus>,
    pub author_id: Option<Uuid>,
    pub destination_department_id: Option<Uuid>,
}

impl DemandFilter {
    pub fn matches(&self, demand: &Demand) -> bool {
        self.status.is_none_or(|s| demand.status == s)
            && (self.status_in.is_empty() || self.status_in.contains(&demand.status))
            && self.status_exclude.is_none_or(|s| demand.status != s)
            && self.author_id.is_none_or(|a| demand.author_id == a)
            && self
                .destination_department_id
                .is_none_or(|d| demand.destination_department_id == Some(d))
    }
}

// Resposta das operações de transferência
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferAck {
    pub demand_id: Uuid,
    pub status: DemandStatus,
    #[schema(example = "Solicitação de transferência enviada para o Protocolo.")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn content() -> DemandContent {
        DemandContent {
            title: "Poda de árvore".into(),
            description: "Árvore com galhos sobre a fiação".into(),
            service_id: Uuid::new_v4(),
            postal_code: None,
            street: Some("Rua Ipiranga".into()),
            number: Some("45".into()),
            complement: None,
            neighborhood: Some("Centro".into()),
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn parse_code_is_case_insensitive() {
        assert_eq!(DemandStatus::parse_code("em_execucao"), Some(DemandStatus::InExecution));
        assert_eq!(DemandStatus::parse_code(" Finalizado "), Some(DemandStatus::Finalized));
        assert_eq!(DemandStatus::parse_code("ARQUIVADO"), None);
    }

    #[test]
    fn manual_update_rules() {
        assert!(DemandStatus::Protocoled.can_update_to(DemandStatus::InExecution));
        assert!(DemandStatus::Protocoled.can_update_to(DemandStatus::Finalized));
        assert!(DemandStatus::InExecution.can_update_to(DemandStatus::Finalized));
        assert!(!DemandStatus::InExecution.can_update_to(DemandStatus::InExecution));
        assert!(!DemandStatus::Draft.can_update_to(DemandStatus::Finalized));
        assert!(!DemandStatus::AwaitingTransfer.can_update_to(DemandStatus::InExecution));
        assert!(!DemandStatus::Finalized.can_update_to(DemandStatus::InExecution));
        assert!(!DemandStatus::Protocoled.can_update_to(DemandStatus::Cancelled));
    }

    #[test]
    fn deadline_start_is_set_only_on_first_protocoled_entry() {
        let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let t2 = t1 + Duration::days(5);
        let mut demand = Demand::new_draft(Uuid::new_v4(), content(), t1);

        demand.enter_status(DemandStatus::AwaitingProtocol, t1);
        assert!(demand.deadline_started_at.is_none());

        demand.enter_status(DemandStatus::Protocoled, t1);
        assert_eq!(demand.deadline_started_at, Some(t1));

        demand.enter_status(DemandStatus::AwaitingTransfer, t2);
        demand.enter_status(DemandStatus::Protocoled, t2);
        assert_eq!(demand.deadline_started_at, Some(t1));
    }

    #[test]
    fn finalization_sets_timestamp() {
        let now = Utc::now();
        let mut demand = Demand::new_draft(Uuid::new_v4(), content(), now);
        demand.status = DemandStatus::InExecution;
        demand.enter_status(DemandStatus::Finalized, now);
        assert_eq!(demand.finalized_at, Some(now));
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let mut demand = Demand::new_draft(Uuid::new_v4(), content(), Utc::now());
        demand.apply_patch(DemandPatch {
            title: Some("Poda urgente".into()),
            ..Default::default()
        });
        assert_eq!(demand.title, "Poda urgente");
        assert_eq!(demand.street.as_deref(), Some("Rua Ipiranga"));
        assert_eq!(demand.description, "Árvore com galhos sobre a fiação");
    }

    #[test]
    fn explicit_null_in_patch_clears_the_field() {
        let mut demand = Demand::new_draft(Uuid::new_v4(), content(), Utc::now());
        demand.complement = Some("Fundos".into());

        let untouched: DemandPatch = serde_json::from_str("{}").unwrap();
        demand.apply_patch(untouched);
        assert_eq!(demand.complement.as_deref(), Some("Fundos"));

        let cleared: DemandPatch = serde_json::from_str(r#"{"complement": null, "street": "Rua Nova"}"#).unwrap();
        demand.apply_patch(cleared);
        assert!(demand.complement.is_none());
        assert_eq!(demand.street.as_deref(), Some("Rua Nova"));
        assert_eq!(demand.neighborhood.as_deref(), Some("Centro"));
    }

    #[test]
    fn coordinates_out_of_range_are_rejected() {
        let mut located = content();
        located.latitude = Some(Decimal::new(-235_505, 4));
        located.longitude = Some(Decimal::new(-466_333, 4));
        assert!(located.validate().is_ok());

        let mut off_map = content();
        off_map.latitude = Some(Decimal::from(91));
        let errors = off_map.validate().unwrap_err();
        assert!(errors.to_string().contains("coordenadas") || errors.to_string().contains("Latitude"));

        let patch: DemandPatch = serde_json::from_str(r#"{"longitude": -180.5}"#).unwrap();
        assert!(patch.validate().is_err());

        let clearing: DemandPatch = serde_json::from_str(r#"{"latitude": null}"#).unwrap();
        assert!(clearing.validate().is_ok());
    }

    #[test]
    fn filter_combines_conditions() {
        let author = Uuid::new_v4();
        let mut demand = Demand::new_draft(author, content(), Utc::now());
        demand.status = DemandStatus::InExecution;

        let by_author = DemandFilter { author_id: Some(author), ..Default::default() };
        assert!(by_author.matches(&demand));

        let excluding = DemandFilter { status_exclude: Some(DemandStatus::InExecution), ..Default::default() };
        assert!(!excluding.matches(&demand));

        let in_list = DemandFilter {
            status_in: vec![DemandStatus::Protocoled, DemandStatus::InExecution],
            ..Default::default()
        };
        assert!(in_list.matches(&demand));
    }
}
