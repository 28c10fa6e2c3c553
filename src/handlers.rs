pub mod catalog;
pub mod demands;
pub mod history;
pub mod notifications;
pub mod users;
