use rand::Rng;
use std::net::IpAddr;
use std::sync::Arc;

use crate::{
    clock::Clock,
    errors::AppError,
    services::{metrics, storage::Storage},
    types::{ActivationOutcome, AdminIdentity, License, UserRecord},
    validator::normalize_license_code,
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_GROUPS: usize = 4;
const CODE_GROUP_LEN: usize = 4;
const MAX_GENERATE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LicenseStats {
    pub total: usize,
    pub activated: usize,
}

#[derive(Clone)]
pub struct LicenseManager {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl LicenseManager {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// One-shot activation. The storage layer performs the unused -> activated
    /// check-and-set; this only normalizes input and accounts for the outcome.
    pub async fn activate(&self, code: &str, user_id: &str) -> Result<ActivationOutcome, AppError> {
        let code = normalize_license_code(code);
        let outcome = self
            .storage
            .activate_license(&code, user_id, self.clock.now())
            .await?;
        metrics::record_license_activation(outcome.as_str());
        match &outcome {
            ActivationOutcome::Activated(_) => {
                tracing::info!(code = %code, user_id, "License activated")
            }
            other => tracing::debug!(code = %code, user_id, outcome = other.as_str(), "License not activated"),
        }
        Ok(outcome)
    }

    /// Upserts the activating user. `created_at` survives repeat activations.
    pub async fn record_user(
        &self,
        user_id: &str,
        license: &License,
        ip: IpAddr,
        vpn_flagged: bool,
    ) -> Result<UserRecord, AppError> {
        let now = self.clock.now();
        let created_at = self
            .storage
            .get_user(user_id)
            .await?
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        let user = UserRecord {
            id: user_id.to_string(),
            license_code: Some(license.code.clone()),
            activated_at: license.activated_at.or(Some(now)),
            last_ip: Some(ip.to_string()),
            vpn_flagged,
            created_at,
        };
        self.storage.upsert_user(&user).await?;
        Ok(user)
    }

    /// Creates an unused license. A supplied code must not exist yet; with no
    /// code a random one is generated.
    pub async fn issue(&self, code: Option<&str>, admin: &AdminIdentity) -> Result<License, AppError> {
        let now = self.clock.now();
        match code.map(normalize_license_code) {
            Some(code) => {
                let license = License::new(code, admin.id.clone(), now);
                if !self.storage.insert_license(&license).await? {
                    return Err(AppError::Conflict(format!(
                        "License {} already exists",
                        license.code
                    )));
                }
                tracing::info!(code = %license.code, admin = %admin.id, "License issued");
                Ok(license)
            }
            None => {
                for _ in 0..MAX_GENERATE_ATTEMPTS {
                    let license = License::new(generate_code(), admin.id.clone(), now);
                    if self.storage.insert_license(&license).await? {
                        tracing::info!(code = %license.code, admin = %admin.id, "License issued");
                        return Ok(license);
                    }
                }
                Err(AppError::Internal(
                    "Could not generate an unused license code".into(),
                ))
            }
        }
    }

    pub async fn stats(&self) -> Result<LicenseStats, AppError> {
        let licenses = self.storage.list_licenses().await?;
        Ok(LicenseStats {
            total: licenses.len(),
            activated: licenses.iter().filter(|l| l.is_activated()).count(),
        })
    }
}

/// `XXXX-XXXX-XXXX-XXXX` over uppercase letters and digits.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(CODE_GROUPS * (CODE_GROUP_LEN + 1));
    for group in 0..CODE_GROUPS {
        if group > 0 {
            code.push('-');
        }
        for _ in 0..CODE_GROUP_LEN {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            code.push(CODE_ALPHABET[idx] as char);
        }
    }
    code
}
