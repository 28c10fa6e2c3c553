use crate::common::error::AppError;

// Nomes padrão que o Postgres cria para os UNIQUE das colunas de protocolo
const PROTOCOL_CONSTRAINTS: [&str; 2] = [
    "demands_legislative_protocol_key",
    "demands_executive_protocol_key",
];

/// Converte erros do sqlx em AppError, separando a violação de unicidade dos protocolos
/// (que o alocador trata com retry) dos demais erros de banco.
pub(crate) fn map_protocol_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            if let Some(constraint) = db_err.constraint() {
                if PROTOCOL_CONSTRAINTS.contains(&constraint) {
                    return AppError::ProtocolConflict(constraint.to_string());
                }
            }
        }
    }
    e.into()
}
