pub mod store;
pub mod user_repo;
pub use user_repo::UserRepository;
pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod demand_repo;
pub use demand_repo::DemandRepository;
pub mod tramitacao_repo;
pub use tramitacao_repo::TramitacaoRepository;
pub mod notification_repo;
pub use notification_repo::NotificationRepository;

pub mod pg_store;
pub use pg_store::PgDemandStore;

// Implementação em memória usada pelos testes dos serviços
#[cfg(test)]
pub mod memory_store;
