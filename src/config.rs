// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::clock::{Clock, SystemClock},
    db::PgDemandStore,
    services::{
        demand_service::DemandService,
        notification_service::{NotificationDispatcher, NotificationService},
        protocol_service::{ProtocolAllocator, DEFAULT_ALLOCATION_ATTEMPTS},
        tramitacao_service::TramitacaoService,
    },
};

// Configurações lidas do ambiente (.env em desenvolvimento)
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub database_max_connections: u32,
    // 0 desliga a varredura automática
    pub overdue_sweep_interval_secs: u64,
    pub protocol_allocation_attempts: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            overdue_sweep_interval_secs: parse_or("OVERDUE_SWEEP_INTERVAL_SECS", 3600)?,
            protocol_allocation_attempts: parse_or("PROTOCOL_ALLOCATION_ATTEMPTS", DEFAULT_ALLOCATION_ATTEMPTS)?,
        })
    }

    pub fn overdue_sweep_interval(&self) -> Option<Duration> {
        (self.overdue_sweep_interval_secs > 0).then(|| Duration::from_secs(self.overdue_sweep_interval_secs))
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("{key} inválida: '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub store: PgDemandStore,
    pub clock: Arc<dyn Clock>,
    pub dispatcher: NotificationDispatcher,
    pub demand_service: DemandService,
    pub tramitacao_service: TramitacaoService,
    pub notification_service: NotificationService,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.database_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let store = PgDemandStore::new(db_pool.clone());
        let shared_store = Arc::new(store.clone());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let dispatcher = NotificationDispatcher::new(shared_store.clone());
        let demand_service = DemandService::new(
            shared_store.clone(),
            ProtocolAllocator::new(settings.protocol_allocation_attempts),
            dispatcher.clone(),
            clock.clone(),
        );
        let tramitacao_service = TramitacaoService::new(shared_store.clone(), clock.clone());
        let notification_service = NotificationService::new(shared_store);

        Ok(Self {
            db_pool,
            jwt_secret: settings.jwt_secret.clone(),
            store,
            clock,
            dispatcher,
            demand_service,
            tramitacao_service,
            notification_service,
        })
    }
}
