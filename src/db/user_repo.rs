// src/db/user_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{Profile, User},
};

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um usuário pelo seu ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let maybe_user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe_user)
    }

    // Listagem para a tela de usuários (filtro opcional por perfil)
    pub async fn list(&self, profile: Option<Profile>) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::user_profile IS NULL OR profile = $1)
            ORDER BY full_name, username
            "#,
        )
            .bind(profile)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn find_by_profile<'e, E>(&self, executor: E, profile: Profile) -> Result<Vec<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE profile = $1 ORDER BY username")
            .bind(profile)
            .fetch_all(executor)
            .await?;
        Ok(users)
    }

    // Usuários de várias secretarias numa única consulta (usado pela varredura de atrasos)
    pub async fn find_by_departments<'e, E>(
        &self,
        executor: E,
        department_ids: &[Uuid],
    ) -> Result<Vec<User>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if department_ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE department_id = ANY($1) ORDER BY username",
        )
            .bind(department_ids)
            .fetch_all(executor)
            .await?;
        Ok(users)
    }

    // Grava só os dados de contato; `None` se o usuário não existe mais
    pub async fn update_profile(&self, user: &User) -> Result<Option<User>, AppError> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = $2, email = $3, job_title = $4, phone = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
            .bind(user.id)
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(&user.job_title)
            .bind(&user.phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }
}
