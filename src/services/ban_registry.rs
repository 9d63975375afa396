use std::sync::Arc;

use crate::{
    clock::Clock,
    errors::AppError,
    services::storage::Storage,
    types::{AdminIdentity, BanRecord, BanSubject},
};

/// Reads go straight to storage on every call so a ban takes effect on the
/// very next request.
#[derive(Clone)]
pub struct BanRegistry {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl BanRegistry {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub async fn is_banned(&self, subject: &BanSubject) -> Result<bool, AppError> {
        Ok(self.storage.get_ban(subject).await?.is_some())
    }

    pub async fn ban(
        &self,
        subject: BanSubject,
        reason: Option<String>,
        admin: &AdminIdentity,
    ) -> Result<BanRecord, AppError> {
        if let BanSubject::Ip(ip) = &subject {
            if ip.is_unspecified() {
                return Err(AppError::BadRequest(
                    "The unspecified address cannot be banned".into(),
                ));
            }
        }

        let record = BanRecord {
            subject,
            reason: reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "No reason given".to_string()),
            banned_by: admin.id.clone(),
            banned_at: self.clock.now(),
        };
        self.storage.put_ban(&record).await?;
        tracing::info!(subject = %record.subject, admin = %admin.id, "Ban applied");
        Ok(record)
    }

    pub async fn unban(&self, subject: &BanSubject) -> Result<bool, AppError> {
        let removed = self.storage.remove_ban(subject).await?;
        if removed {
            tracing::info!(subject = %subject, "Ban lifted");
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<BanRecord>, AppError> {
        self.storage.list_bans().await
    }
}
