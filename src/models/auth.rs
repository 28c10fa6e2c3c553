// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

// Perfis do sistema. O conjunto é fechado: toda checagem de acesso parte daqui.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_profile")]
pub enum Profile {
    #[serde(rename = "VEREADOR")]
    #[sqlx(rename = "VEREADOR")]
    Representative,
    #[serde(rename = "PROTOCOLO")]
    #[sqlx(rename = "PROTOCOLO")]
    IntakeOffice,
    #[serde(rename = "SECRETARIA")]
    #[sqlx(rename = "SECRETARIA")]
    Department,
    #[serde(rename = "GESTOR")]
    #[sqlx(rename = "GESTOR")]
    Manager,
}

impl Profile {
    pub const ALL: [Profile; 4] = [
        Profile::Representative,
        Profile::IntakeOffice,
        Profile::Department,
        Profile::Manager,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Profile::Representative => "Vereador",
            Profile::IntakeOffice => "Protocolo",
            Profile::Department => "Secretaria",
            Profile::Manager => "Gestor",
        }
    }
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "joao.silva")]
    pub username: String,
    #[schema(example = "João da Silva")]
    pub full_name: String,
    pub email: Option<String>,
    pub profile: Profile,
    // Só faz sentido para o perfil SECRETARIA
    pub department_id: Option<Uuid>,
    #[schema(example = "Assessor Parlamentar")]
    pub job_title: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn apply_profile_update(&mut self, update: ProfileUpdate) {
        if let Some(full_name) = update.full_name {
            self.full_name = full_name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(job_title) = update.job_title {
            self.job_title = job_title;
        }
        if let Some(phone) = update.phone {
            self.phone = phone;
        }
    }
}

// PATCH /api/users/me: só os dados de contato. Perfil, secretaria e login são do
// serviço de autenticação e são ignorados se vierem no corpo.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 255, message = "O nome deve ter entre 1 e 255 caracteres."))]
    #[schema(example = "João da Silva")]
    pub full_name: Option<String>,
    #[validate(email(message = "E-mail inválido."))]
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable, example = "joao.silva@camara.sp.gov.br")]
    pub email: Option<Option<String>>,
    #[validate(length(max = 100, message = "O cargo deve ter no máximo 100 caracteres."))]
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub job_title: Option<Option<String>>,
    #[validate(length(max = 20, message = "O telefone deve ter no máximo 20 caracteres."))]
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable, example = "(11) 4000-1234")]
    pub phone: Option<Option<String>>,
}

// Estrutura de dados ("claims") dentro do JWT emitido pelo serviço de autenticação
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "vereador".into(),
            full_name: "Vereador".into(),
            email: Some("antigo@camara.sp.gov.br".into()),
            profile: Profile::Representative,
            department_id: None,
            job_title: Some("Vereador".into()),
            phone: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn profile_update_touches_only_contact_fields() {
        let mut me = user();
        let update: ProfileUpdate = serde_json::from_str(
            r#"{"fullName": "Maria Souza", "phone": "(11) 4000-1234", "jobTitle": null,
                "profile": "GESTOR", "username": "admin"}"#,
        )
        .unwrap();
        assert!(update.validate().is_ok());
        me.apply_profile_update(update);

        assert_eq!(me.full_name, "Maria Souza");
        assert_eq!(me.phone.as_deref(), Some("(11) 4000-1234"));
        assert!(me.job_title.is_none());
        assert_eq!(me.email.as_deref(), Some("antigo@camara.sp.gov.br"));
        assert_eq!(me.profile, Profile::Representative);
        assert_eq!(me.username, "vereador");
    }

    #[test]
    fn profile_update_rejects_bad_contact_data() {
        let bad_email: ProfileUpdate = serde_json::from_str(r#"{"email": "sem-arroba"}"#).unwrap();
        assert!(bad_email.validate().is_err());

        let blank_name: ProfileUpdate = serde_json::from_str(r#"{"fullName": ""}"#).unwrap();
        assert!(blank_name.validate().is_err());

        let long_phone = ProfileUpdate { phone: Some(Some("9".repeat(21))), ..Default::default() };
        assert!(long_phone.validate().is_err());

        let clear_email: ProfileUpdate = serde_json::from_str(r#"{"email": null}"#).unwrap();
        assert!(clear_email.validate().is_ok());
    }
}
