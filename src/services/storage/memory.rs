use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::Storage;
use crate::{
    errors::AppError,
    types::{ActivationOutcome, BanRecord, BanSubject, License, UserRecord},
};

/// Process-local registries. Each map is sharded, so a write lock covers one
/// shard, never the whole table.
#[derive(Default)]
pub struct MemoryStorage {
    bans: DashMap<String, BanRecord>,
    licenses: DashMap<String, License>,
    users: DashMap<String, UserRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_ban(&self, subject: &BanSubject) -> Result<Option<BanRecord>, AppError> {
        Ok(self.bans.get(&subject.storage_key()).map(|r| r.value().clone()))
    }

    async fn put_ban(&self, record: &BanRecord) -> Result<(), AppError> {
        self.bans.insert(record.subject.storage_key(), record.clone());
        Ok(())
    }

    async fn remove_ban(&self, subject: &BanSubject) -> Result<bool, AppError> {
        Ok(self.bans.remove(&subject.storage_key()).is_some())
    }

    async fn list_bans(&self) -> Result<Vec<BanRecord>, AppError> {
        Ok(self.bans.iter().map(|r| r.value().clone()).collect())
    }

    async fn insert_license(&self, license: &License) -> Result<bool, AppError> {
        match self.licenses.entry(license.code.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(license.clone());
                Ok(true)
            }
        }
    }

    async fn get_license(&self, code: &str) -> Result<Option<License>, AppError> {
        Ok(self.licenses.get(code).map(|r| r.value().clone()))
    }

    async fn activate_license(
        &self,
        code: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<ActivationOutcome, AppError> {
        // The shard write guard spans the read and the write; it drops on return.
        let Some(mut license) = self.licenses.get_mut(code) else {
            return Ok(ActivationOutcome::NotFound);
        };
        if license.is_activated() {
            return Ok(ActivationOutcome::AlreadyActivated);
        }
        let next = license.activated(user_id, at);
        *license = next;
        Ok(ActivationOutcome::Activated(license.clone()))
    }

    async fn list_licenses(&self) -> Result<Vec<License>, AppError> {
        Ok(self.licenses.iter().map(|r| r.value().clone()).collect())
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.get(id).map(|r| r.value().clone()))
    }

    async fn delete_user(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.users.remove(id).is_some())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        Ok(self.users.iter().map(|r| r.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn license(code: &str) -> License {
        License::new(code.to_string(), "admin".to_string(), Utc::now())
    }

    #[tokio::test]
    async fn duplicate_license_codes_are_refused() {
        let store = MemoryStorage::new();
        assert!(store.insert_license(&license("ABC123")).await.unwrap());
        assert!(!store.insert_license(&license("ABC123")).await.unwrap());
        assert_eq!(store.list_licenses().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_code_has_no_side_effects() {
        let store = MemoryStorage::new();
        let outcome = store.activate_license("NOPE", "user1", Utc::now()).await.unwrap();
        assert_eq!(outcome, ActivationOutcome::NotFound);
        assert!(store.get_license("NOPE").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn racing_activations_have_one_winner() {
        let store = Arc::new(MemoryStorage::new());
        store.insert_license(&license("RACE01")).await.unwrap();

        let attempts = (0..32).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let user = format!("user{}", i);
                let outcome = store.activate_license("RACE01", &user, Utc::now()).await.unwrap();
                (user, outcome)
            })
        });
        let results = futures::future::join_all(attempts).await;

        let winners: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap())
            .filter(|(_, outcome)| matches!(outcome, ActivationOutcome::Activated(_)))
            .map(|(user, _)| user)
            .collect();
        assert_eq!(winners.len(), 1);

        let stored = store.get_license("RACE01").await.unwrap().unwrap();
        assert_eq!(stored.activated_by.as_deref(), Some(winners[0].as_str()));
    }

    #[tokio::test]
    async fn ban_is_visible_immediately_and_removable() {
        let store = MemoryStorage::new();
        let subject = BanSubject::User("user1".into());
        store
            .put_ban(&BanRecord {
                subject: subject.clone(),
                reason: "spam".into(),
                banned_by: "admin".into(),
                banned_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(store.get_ban(&subject).await.unwrap().is_some());
        assert!(store.remove_ban(&subject).await.unwrap());
        assert!(store.get_ban(&subject).await.unwrap().is_none());
        assert!(!store.remove_ban(&subject).await.unwrap());
    }
}
