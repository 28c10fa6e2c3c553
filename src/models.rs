pub mod auth;
pub mod catalog;
pub mod demand;
pub mod notification;
pub mod tramitacao;
