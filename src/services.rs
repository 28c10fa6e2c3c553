pub mod demand_service;
pub mod notification_service;
pub mod protocol_service;
pub mod rbac_service;
pub mod tramitacao_service;
