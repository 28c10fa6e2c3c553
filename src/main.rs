//src/main.rs

use anyhow::Context;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Settings};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;
use crate::services::notification_service::spawn_overdue_sweep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; padrão "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let settings = Settings::from_env()?;
    let app_state = AppState::new(&settings).await?;

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados.")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // `sgdl-backend sweep-overdue`: roda a verificação de atrasos uma vez e sai (cron)
    if std::env::args().nth(1).as_deref() == Some("sweep-overdue") {
        let today = app_state.clock.now().date_naive();
        let report = app_state.dispatcher.run_overdue_sweep(today).await?;
        tracing::info!(
            demands = report.demands_marked,
            notifications = report.notifications_created,
            "Verificação de atrasos concluída"
        );
        return Ok(());
    }

    if let Some(every) = settings.overdue_sweep_interval() {
        tracing::info!(seconds = every.as_secs(), "⏰ Verificação periódica de atrasos ativada");
        spawn_overdue_sweep(app_state.dispatcher.clone(), app_state.clock.clone(), every);
    }

    let demand_routes = Router::new()
        .route(
            "/",
            post(handlers::demands::create_demand).get(handlers::demands::list_demands),
        )
        .route(
            "/{id}",
            get(handlers::demands::get_demand)
                .put(handlers::demands::replace_demand)
                .patch(handlers::demands::patch_demand)
                .delete(handlers::demands::delete_demand),
        )
        .route("/{id}/submit", post(handlers::demands::submit_demand))
        .route("/{id}/dispatch", post(handlers::demands::dispatch_demand))
        .route("/{id}/status", post(handlers::demands::update_demand_status))
        .route("/{id}/transfer-request", post(handlers::demands::request_transfer))
        .route("/{id}/transfer-approval", post(handlers::demands::approve_transfer))
        .route(
            "/{id}/history",
            get(handlers::history::list_history).post(handlers::history::add_history_entry),
        );

    let notification_routes = Router::new()
        .route("/", get(handlers::notifications::list_notifications))
        .route("/read-all", post(handlers::notifications::mark_all_notifications_read))
        .route("/{id}/read", post(handlers::notifications::mark_notification_read));

    let user_routes = Router::new()
        .route("/", get(handlers::users::list_users))
        .route("/me", get(handlers::users::get_me).patch(handlers::users::update_me));

    // Tudo abaixo exige o Bearer token
    let protected = Router::new()
        .nest("/demands", demand_routes)
        .nest("/notifications", notification_routes)
        .nest("/users", user_routes)
        .route("/departments", get(handlers::catalog::list_departments))
        .route("/services", get(handlers::catalog::list_services))
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api", protected)
        .with_state(app_state);

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Falha ao iniciar o listener TCP em {}", settings.bind_addr))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await.context("Erro no servidor Axum")?;

    Ok(())
}
