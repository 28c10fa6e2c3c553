// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Demands ---
        handlers::demands::list_demands,
        handlers::demands::create_demand,
        handlers::demands::get_demand,
        handlers::demands::replace_demand,
        handlers::demands::patch_demand,
        handlers::demands::delete_demand,
        handlers::demands::submit_demand,
        handlers::demands::dispatch_demand,
        handlers::demands::update_demand_status,
        handlers::demands::request_transfer,
        handlers::demands::approve_transfer,

        // --- History ---
        handlers::history::list_history,
        handlers::history::add_history_entry,

        // --- Notifications ---
        handlers::notifications::list_notifications,
        handlers::notifications::mark_notification_read,
        handlers::notifications::mark_all_notifications_read,

        // --- Catalog ---
        handlers::catalog::list_departments,
        handlers::catalog::list_services,

        // --- Users ---
        handlers::users::list_users,
        handlers::users::get_me,
        handlers::users::update_me,
    ),
    components(
        schemas(
            // --- Demands ---
            models::demand::DemandStatus,
            models::demand::Demand,
            models::demand::DemandContent,
            models::demand::DemandPatch,
            models::demand::TransferAck,
            handlers::demands::DispatchPayload,
            handlers::demands::UpdateStatusPayload,
            handlers::demands::ApproveTransferPayload,

            // --- History ---
            models::tramitacao::TramitacaoKind,
            models::tramitacao::Tramitacao,
            models::tramitacao::TramitacaoAttachment,
            services::tramitacao_service::ManualEntryRequest,

            // --- Notifications ---
            models::notification::NotificationKind,
            models::notification::Notification,
            handlers::notifications::MarkAllReadResponse,

            // --- Catalog ---
            models::catalog::ServiceKind,
            models::catalog::Department,
            models::catalog::Service,

            // --- Auth ---
            models::auth::Profile,
            models::auth::User,
            models::auth::ProfileUpdate,
        )
    ),
    tags(
        (name = "Demands", description = "Ciclo de vida das demandas (rascunho, protocolo, execução, transferência)"),
        (name = "History", description = "Tramitações da demanda"),
        (name = "Notifications", description = "Caixa de entrada do usuário"),
        (name = "Catalog", description = "Secretarias e carta de serviços"),
        (name = "Users", description = "Dados do Usuário e Perfil")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
