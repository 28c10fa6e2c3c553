// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    db::store::DemandStore,
    middleware::i18n::Locale,
    models::auth::{Claims, User},
};

// Valida o token emitido pelo serviço de autenticação e devolve o ID do usuário
pub fn decode_subject(token: &str, secret: &str) -> Result<uuid::Uuid, AppError> {
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map_err(|e| {
            tracing::debug!(error = %e, "Token rejeitado");
            AppError::InvalidToken
        })?;
    Ok(token_data.claims.sub)
}

// Token válido de um usuário que não existe mais conta como token inválido
pub async fn resolve_user(store: &dyn DemandStore, token: &str, secret: &str) -> Result<User, AppError> {
    let user_id = decode_subject(token, secret)?;
    store.find_user(user_id).await?.ok_or_else(|| {
        tracing::warn!(%user_id, "Token de usuário inexistente");
        AppError::InvalidToken
    })
}

// O middleware em si: exige Bearer válido e carrega o usuário
pub async fn auth_guard(
    State(app_state): State<AppState>,
    locale: Locale,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale))?;

    let user = resolve_user(&app_state.store, bearer.token(), &app_state.jwt_secret)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    // Insere o usuário nos "extensions" da requisição
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

// Extrator para obter o usuário autenticado diretamente nos handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&Locale::from_headers(&parts.headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::memory_store::MemoryStore, models::auth::Profile};
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn token(sub: Uuid, secret: &str, expires_in: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub,
            exp: (now + expires_in).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn accepts_token_signed_with_shared_secret() {
        let id = Uuid::new_v4();
        assert_eq!(decode_subject(&token(id, "segredo", Duration::hours(1)), "segredo").unwrap(), id);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let id = Uuid::new_v4();
        let err = decode_subject(&token(id, "outro", Duration::hours(1)), "segredo").unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));

        let err = decode_subject(&token(id, "segredo", Duration::hours(-2)), "segredo").unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[tokio::test]
    async fn resolves_only_subjects_that_still_exist() {
        let store = MemoryStore::new();
        let user = store.add_user("vereador", Profile::Representative, None);

        let found = resolve_user(&store, &token(user.id, "segredo", Duration::hours(1)), "segredo")
            .await
            .unwrap();
        assert_eq!(found.id, user.id);

        let stranger = token(Uuid::new_v4(), "segredo", Duration::hours(1));
        let err = resolve_user(&store, &stranger, "segredo").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }
}
