// src/db/demand_repo.rs

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_protocol_violation, error::AppError},
    db::store::OverdueCandidate,
    models::demand::{Demand, DemandFilter, DemandStatus},
    services::protocol_service::ProtocolKind,
};

#[derive(Clone)]
pub struct DemandRepository {
    pool: PgPool,
}

impl DemandRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Demand>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let demand = sqlx::query_as::<_, Demand>("SELECT * FROM demands WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(demand)
    }

    // Listagem com os filtros da tela (status, status__in, status__exclude, autor, secretaria)
    pub async fn list(&self, filter: &DemandFilter) -> Result<Vec<Demand>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM demands WHERE TRUE");

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if !filter.status_in.is_empty() {
            let codes: Vec<String> = filter.status_in.iter().map(|s| s.code().to_string()).collect();
            qb.push(" AND status::text = ANY(").push_bind(codes).push(")");
        }
        if let Some(excluded) = filter.status_exclude {
            qb.push(" AND status <> ").push_bind(excluded);
        }
        if let Some(author_id) = filter.author_id {
            qb.push(" AND author_id = ").push_bind(author_id);
        }
        if let Some(department_id) = filter.destination_department_id {
            qb.push(" AND destination_department_id = ").push_bind(department_id);
        }
        qb.push(" ORDER BY created_at DESC");

        let demands = qb.build_query_as::<Demand>().fetch_all(&self.pool).await?;
        Ok(demands)
    }

    pub async fn insert<'e, E>(&self, executor: E, demand: &Demand) -> Result<Demand, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Demand>(
            r#"
            INSERT INTO demands (
                id, title, description, postal_code, street, number, complement,
                neighborhood, latitude, longitude, status, author_id, service_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
            .bind(demand.id)
            .bind(&demand.title)
            .bind(&demand.description)
            .bind(&demand.postal_code)
            .bind(&demand.street)
            .bind(&demand.number)
            .bind(&demand.complement)
            .bind(&demand.neighborhood)
            .bind(demand.latitude)
            .bind(demand.longitude)
            .bind(demand.status)
            .bind(demand.author_id)
            .bind(demand.service_id)
            .bind(demand.created_at)
            .fetch_one(executor)
            .await?;
        Ok(created)
    }

    pub async fn update_content<'e, E>(&self, executor: E, demand: &Demand) -> Result<Option<Demand>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let updated = sqlx::query_as::<_, Demand>(
            r#"
            UPDATE demands
            SET title = $2, description = $3, postal_code = $4, street = $5, number = $6,
                complement = $7, neighborhood = $8, latitude = $9, longitude = $10, service_id = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(demand.id)
            .bind(&demand.title)
            .bind(&demand.description)
            .bind(&demand.postal_code)
            .bind(&demand.street)
            .bind(&demand.number)
            .bind(&demand.complement)
            .bind(&demand.neighborhood)
            .bind(demand.latitude)
            .bind(demand.longitude)
            .bind(demand.service_id)
            .fetch_optional(executor)
            .await?;
        Ok(updated)
    }

    pub async fn delete_draft<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM demands WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(DemandStatus::Draft)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Quantos códigos daquela sequência já começam com o prefixo do ano
    pub async fn count_protocols<'e, E>(
        &self,
        executor: E,
        kind: ProtocolKind,
        prefix: &str,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT COUNT(*) FROM demands WHERE {} LIKE $1 || '%'", kind.column());
        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(prefix)
            .fetch_one(executor)
            .await?;
        Ok(total)
    }

    // Grava o novo estado da transição, condicionado ao status anterior.
    // `None` = a demanda mudou de status no meio do caminho.
    pub async fn apply_transition<'e, E>(
        &self,
        executor: E,
        demand: &Demand,
        expected_status: DemandStatus,
    ) -> Result<Option<Demand>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Demand>(
            r#"
            UPDATE demands
            SET status = $2,
                legislative_protocol = $3,
                executive_protocol = $4,
                destination_department_id = $5,
                deadline_started_at = $6,
                finalized_at = $7
            WHERE id = $1 AND status = $8
            RETURNING *
            "#,
        )
            .bind(demand.id)
            .bind(demand.status)
            .bind(&demand.legislative_protocol)
            .bind(&demand.executive_protocol)
            .bind(demand.destination_department_id)
            .bind(demand.deadline_started_at)
            .bind(demand.finalized_at)
            .bind(expected_status)
            .fetch_optional(executor)
            .await
            .map_err(map_protocol_violation)
    }

    pub async fn overdue_candidates<'e, E>(&self, executor: E) -> Result<Vec<OverdueCandidate>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let in_progress: Vec<String> = DemandStatus::IN_PROGRESS.iter().map(|s| s.code().to_string()).collect();

        let candidates = sqlx::query_as::<_, OverdueCandidate>(
            r#"
            SELECT
                d.id AS demand_id,
                d.title,
                d.executive_protocol,
                d.destination_department_id,
                d.deadline_started_at,
                s.deadline_days
            FROM demands d
            JOIN services s ON s.id = d.service_id
            WHERE d.status::text = ANY($1)
              AND d.overdue_notified = FALSE
              AND s.deadline_days IS NOT NULL
              AND d.deadline_started_at IS NOT NULL
            ORDER BY d.deadline_started_at
            "#,
        )
            .bind(in_progress)
            .fetch_all(executor)
            .await?;
        Ok(candidates)
    }

    // Trava só quem ainda está livre; varreduras sobrepostas disputam a mesma linha
    // e apenas uma recebe o id de volta.
    pub async fn latch_overdue<'e, E>(&self, executor: E, demand_ids: &[Uuid]) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let latched = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE demands
            SET overdue_notified = TRUE
            WHERE id = ANY($1) AND overdue_notified = FALSE
            RETURNING id
            "#,
        )
            .bind(demand_ids)
            .fetch_all(executor)
            .await?;
        Ok(latched)
    }
}
