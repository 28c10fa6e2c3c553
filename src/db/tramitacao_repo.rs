// src/db/tramitacao_repo.rs

use std::collections::HashMap;

use sqlx::{Executor, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::tramitacao::{NewTramitacao, Tramitacao, TramitacaoAttachment},
};

// Histórico append-only: só existem INSERT e SELECT aqui.
#[derive(Clone)]
pub struct TramitacaoRepository {
    pool: PgPool,
}

impl TramitacaoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Recebe a conexão (ou transação) porque grava o lançamento e os anexos em sequência
    pub async fn insert(&self, conn: &mut PgConnection, entry: NewTramitacao) -> Result<Tramitacao, AppError> {
        let mut record = sqlx::query_as::<_, Tramitacao>(
            r#"
            INSERT INTO tramitacoes (id, demand_id, actor_id, kind, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, demand_id, actor_id, kind, description, created_at
            "#,
        )
            .bind(entry.id)
            .bind(entry.demand_id)
            .bind(entry.actor_id)
            .bind(entry.kind)
            .bind(&entry.description)
            .bind(entry.created_at)
            .fetch_one(&mut *conn)
            .await?;

        if !entry.attachments.is_empty() {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO tramitacao_attachments (tramitacao_id, file_path) ",
            );
            qb.push_values(entry.attachments, |mut row, file_path| {
                row.push_bind(record.id).push_bind(file_path);
            });
            qb.push(" RETURNING *");

            record.attachments = qb
                .build_query_as::<TramitacaoAttachment>()
                .fetch_all(&mut *conn)
                .await?;
        }

        Ok(record)
    }

    // Mais recentes primeiro; empate de timestamp resolvido pelo id (UUID v7, ordem de inserção)
    pub async fn list_by_demand(&self, demand_id: Uuid) -> Result<Vec<Tramitacao>, AppError> {
        let mut entries = sqlx::query_as::<_, Tramitacao>(
            r#"
            SELECT id, demand_id, actor_id, kind, description, created_at
            FROM tramitacoes
            WHERE demand_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
            .bind(demand_id)
            .fetch_all(&self.pool)
            .await?;

        if entries.is_empty() {
            return Ok(entries);
        }

        let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        let attachments = self.attachments_for(&self.pool, &ids).await?;

        let mut by_entry: HashMap<Uuid, Vec<TramitacaoAttachment>> = HashMap::new();
        for attachment in attachments {
            by_entry.entry(attachment.tramitacao_id).or_default().push(attachment);
        }
        for entry in &mut entries {
            entry.attachments = by_entry.remove(&entry.id).unwrap_or_default();
        }

        Ok(entries)
    }

    async fn attachments_for<'e, E>(&self, executor: E, ids: &[Uuid]) -> Result<Vec<TramitacaoAttachment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let attachments = sqlx::query_as::<_, TramitacaoAttachment>(
            "SELECT * FROM tramitacao_attachments WHERE tramitacao_id = ANY($1) ORDER BY file_path",
        )
            .bind(ids)
            .fetch_all(executor)
            .await?;
        Ok(attachments)
    }
}
