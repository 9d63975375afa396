use chrono::DateTime;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{config::security::SecurityConfig, errors::AppError, types::AdminIdentity};

/// Claims the identity provider puts in an admin credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

impl AdminClaims {
    fn grants_admin(&self) -> bool {
        self.is_admin == Some(true) || self.role.as_deref() == Some("admin")
    }
}

/// Stateless HS256 verification; nothing is looked up or remembered between
/// requests.
pub struct AdminAuthenticator {
    key: DecodingKey,
    validation: Validation,
    allowed_emails: Vec<String>,
}

impl AdminAuthenticator {
    pub fn new(config: &SecurityConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 5;
        Self {
            key: DecodingKey::from_secret(config.admin_jwt_secret.as_bytes()),
            validation,
            allowed_emails: config
                .admin_emails
                .iter()
                .map(|e| e.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// `Unauthorized` for anything that is not a valid, unexpired credential;
    /// `Forbidden` for a valid credential that lacks admin privilege.
    pub fn verify(&self, credential: &str) -> Result<AdminIdentity, AppError> {
        let data = decode::<AdminClaims>(credential.trim(), &self.key, &self.validation).map_err(
            |err| {
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => "Admin credential has expired",
                    _ => "Admin credential is invalid",
                };
                tracing::warn!(error = %err, "Admin credential rejected");
                AppError::Unauthorized(reason.into())
            },
        )?;
        let claims = data.claims;

        if !claims.grants_admin() {
            tracing::warn!(sub = %claims.sub, "Credential without admin privilege");
            return Err(AppError::Forbidden("Admin privilege required".into()));
        }

        if !self.allowed_emails.is_empty() {
            let allowed = claims
                .email
                .as_deref()
                .map(|e| e.trim().to_ascii_lowercase())
                .is_some_and(|e| self.allowed_emails.contains(&e));
            if !allowed {
                tracing::warn!(sub = %claims.sub, "Admin email not in allow-list");
                return Err(AppError::Forbidden("Admin privilege required".into()));
            }
        }

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AppError::Unauthorized("Admin credential is invalid".into()))?;

        Ok(AdminIdentity {
            id: claims.sub,
            email: claims.email,
            expires_at,
        })
    }
}
