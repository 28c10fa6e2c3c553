// src/db/notification_repo.rs

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::notification::{NewNotification, Notification},
};

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Inserção em lote (um único INSERT com VALUES múltiplos)
    pub async fn insert_many<'e, E>(&self, executor: E, notifications: &[NewNotification]) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if notifications.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO notifications (recipient_id, message, link, kind) ");
        qb.push_values(notifications, |mut row, n| {
            row.push_bind(n.recipient_id)
                .push_bind(&n.message)
                .push_bind(&n.link)
                .push_bind(n.kind);
        });

        let result = qb.build().execute(executor).await?;
        Ok(result.rows_affected())
    }

    pub async fn list_for(&self, recipient_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, AppError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1 AND ($2 = FALSE OR read = FALSE)
            ORDER BY created_at DESC
            "#,
        )
            .bind(recipient_id)
            .bind(unread_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(notifications)
    }

    // Só o destinatário pode marcar a própria notificação
    pub async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND read = FALSE")
            .bind(recipient_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
