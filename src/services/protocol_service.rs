// src/services/protocol_service.rs

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    common::error::AppError,
    db::store::{DemandStore, TransitionCommit},
    models::{demand::Demand, tramitacao::Tramitacao},
};

pub const DEFAULT_ALLOCATION_ATTEMPTS: u32 = 5;

/// As duas sequências independentes de protocolo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    /// Gerado no envio oficial: `OFICIO-2026-0001`
    Legislative,
    /// Gerado no despacho: `2026-0001`
    Executive,
}

impl ProtocolKind {
    pub fn prefix(&self, year: i32) -> String {
        match self {
            ProtocolKind::Legislative => format!("OFICIO-{year}-"),
            ProtocolKind::Executive => format!("{year}-"),
        }
    }

    pub fn format(&self, year: i32, seq: i64) -> String {
        format!("{}{seq:04}", self.prefix(year))
    }

    // Coluna da tabela demands (valor fixo, nunca vem do usuário)
    pub fn column(&self) -> &'static str {
        match self {
            ProtocolKind::Legislative => "legislative_protocol",
            ProtocolKind::Executive => "executive_protocol",
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::Legislative => f.write_str("legislativo"),
            ProtocolKind::Executive => f.write_str("executivo"),
        }
    }
}

/// Alocador de protocolos. Mantém um lock assíncrono por (tipo, ano): a contagem e a
/// gravação da transição acontecem com o lock tomado, então dois pedidos do mesmo
/// processo nunca geram o mesmo número. Entre processos, a UNIQUE do banco sinaliza o
/// conflito e a alocação é refeita com uma contagem nova.
#[derive(Clone)]
pub struct ProtocolAllocator {
    locks: Arc<Mutex<HashMap<(ProtocolKind, i32), Arc<Mutex<()>>>>>,
    max_attempts: u32,
}

impl Default for ProtocolAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOCATION_ATTEMPTS)
    }
}

impl ProtocolAllocator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            max_attempts: max_attempts.max(1),
        }
    }

    async fn lock_for(&self, kind: ProtocolKind, year: i32) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry((kind, year)).or_default().clone()
    }

    /// Próximo código da sequência: total de códigos do ano + 1.
    pub async fn allocate(&self, store: &dyn DemandStore, kind: ProtocolKind, year: i32) -> Result<String, AppError> {
        let total = store.count_protocols(kind, &kind.prefix(year)).await?;
        Ok(kind.format(year, total + 1))
    }

    /// Aloca um código e grava a transição montada por `build` sob o lock da sequência.
    pub async fn commit_with_protocol<F>(
        &self,
        store: &dyn DemandStore,
        kind: ProtocolKind,
        year: i32,
        build: F,
    ) -> Result<(Demand, Tramitacao), AppError>
    where
        F: Fn(&str) -> TransitionCommit + Send,
    {
        let lock = self.lock_for(kind, year).await;
        let _guard = lock.lock().await;

        for attempt in 1..=self.max_attempts {
            let code = self.allocate(store, kind, year).await?;

            match store.commit_transition(build(&code)).await {
                Ok(committed) => {
                    tracing::info!(protocol = %code, kind = %kind, "Protocolo alocado");
                    return Ok(committed);
                }
                Err(AppError::ProtocolConflict(constraint)) => {
                    tracing::warn!(
                        protocol = %code,
                        %constraint,
                        attempt,
                        "Protocolo já utilizado por outra gravação, tentando novamente"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(kind = %kind, year, attempts = self.max_attempts, "Alocação de protocolo esgotada");
        Err(AppError::ProtocolAllocationExhausted(self.max_attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::memory_store::MemoryStore,
        models::{
            auth::Profile,
            demand::{DemandContent, DemandStatus},
            tramitacao::{NewTramitacao, TramitacaoKind},
        },
    };
    use chrono::Utc;

    fn seed_draft(store: &MemoryStore) -> Demand {
        let department = store.add_department("Obras");
        let service = store.add_service("Tapa-buraco", department.id, Some(10));
        let author = store.add_user("vereador", Profile::Representative, None);
        let demand = Demand::new_draft(
            author.id,
            DemandContent {
                title: "Buraco".into(),
                description: "Buraco na via".into(),
                service_id: service.id,
                postal_code: None,
                street: None,
                number: None,
                complement: None,
                neighborhood: None,
                latitude: None,
                longitude: None,
            },
            Utc::now(),
        );
        store.put_demand(demand.clone());
        demand
    }

    fn submit_commit(demand: &Demand, code: &str) -> TransitionCommit {
        let mut next = demand.clone();
        next.legislative_protocol = Some(code.to_string());
        next.enter_status(DemandStatus::AwaitingProtocol, Utc::now());
        TransitionCommit {
            entry: NewTramitacao::new(next.id, None, TramitacaoKind::OfficialSubmission, "envio", Utc::now()),
            demand: next,
            expected_status: DemandStatus::Draft,
            notifications: Vec::new(),
        }
    }

    #[test]
    fn codes_are_zero_padded_per_kind() {
        assert_eq!(ProtocolKind::Legislative.format(2026, 1), "OFICIO-2026-0001");
        assert_eq!(ProtocolKind::Executive.format(2026, 42), "2026-0042");
        assert_eq!(ProtocolKind::Executive.format(2026, 12345), "2026-12345");
    }

    #[tokio::test]
    async fn allocate_counts_only_the_requested_year() {
        let store = MemoryStore::new();
        let mut old = seed_draft(&store);
        old.status = DemandStatus::AwaitingProtocol;
        old.legislative_protocol = Some("OFICIO-2025-0007".into());
        store.put_demand(old);

        let allocator = ProtocolAllocator::default();
        let code = allocator.allocate(&store, ProtocolKind::Legislative, 2026).await.unwrap();
        assert_eq!(code, "OFICIO-2026-0001");
    }

    #[tokio::test]
    async fn retries_after_conflict_with_fresh_count() {
        let store = MemoryStore::new();
        let demand = seed_draft(&store);
        store.force_protocol_conflicts(2);

        let allocator = ProtocolAllocator::new(5);
        let (saved, _) = allocator
            .commit_with_protocol(&store, ProtocolKind::Legislative, 2026, |code| submit_commit(&demand, code))
            .await
            .unwrap();

        assert_eq!(saved.legislative_protocol.as_deref(), Some("OFICIO-2026-0001"));
        assert_eq!(store.commit_attempts(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let store = MemoryStore::new();
        let demand = seed_draft(&store);
        store.force_protocol_conflicts(10);

        let allocator = ProtocolAllocator::new(3);
        let err = allocator
            .commit_with_protocol(&store, ProtocolKind::Legislative, 2026, |code| submit_commit(&demand, code))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ProtocolAllocationExhausted(3)));
        assert_eq!(store.demand(demand.id).unwrap().status, DemandStatus::Draft);
        assert!(store.tramitacoes_of(demand.id).is_empty());
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let store = MemoryStore::new();
        let demand = seed_draft(&store);

        let allocator = ProtocolAllocator::new(5);
        let err = allocator
            .commit_with_protocol(&store, ProtocolKind::Legislative, 2026, |code| {
                let mut commit = submit_commit(&demand, code);
                commit.expected_status = DemandStatus::AwaitingProtocol;
                commit
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidState { .. }));
        assert_eq!(store.commit_attempts(), 1);
    }
}
