use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sled::{Db, Tree};
use std::time::Instant;

use super::Storage;
use crate::{
    config::storage::StorageConfig,
    errors::AppError,
    services::metrics,
    types::{ActivationOutcome, BanRecord, BanSubject, License, UserRecord},
};

/// Durable registries on an embedded sled database, one tree per registry,
/// JSON-encoded values.
pub struct SledStorage {
    _db: Db,
    bans: Tree,
    licenses: Tree,
    users: Tree,
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, AppError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn scan<T: DeserializeOwned>(tree: &Tree) -> Result<Vec<T>, AppError> {
    tree.iter()
        .values()
        .map(|value| decode(&value?))
        .collect()
}

impl SledStorage {
    pub fn open(config: &StorageConfig) -> Result<Self, AppError> {
        let db = sled::Config::new()
            .path(&config.sled_path)
            .cache_capacity(config.sled_cache_bytes)
            .flush_every_ms(Some(config.sled_flush_ms))
            .use_compression(config.sled_compression)
            .open()?;
        Self::from_db(db)
    }

    /// Throwaway database removed on drop.
    pub fn temporary() -> Result<Self, AppError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, AppError> {
        Ok(Self {
            bans: db.open_tree("bans")?,
            licenses: db.open_tree("licenses")?,
            users: db.open_tree("users")?,
            _db: db,
        })
    }
}

#[async_trait]
impl Storage for SledStorage {
    async fn get_ban(&self, subject: &BanSubject) -> Result<Option<BanRecord>, AppError> {
        self.bans
            .get(subject.storage_key())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn put_ban(&self, record: &BanRecord) -> Result<(), AppError> {
        self.bans.insert(record.subject.storage_key(), encode(record)?)?;
        Ok(())
    }

    async fn remove_ban(&self, subject: &BanSubject) -> Result<bool, AppError> {
        Ok(self.bans.remove(subject.storage_key())?.is_some())
    }

    async fn list_bans(&self) -> Result<Vec<BanRecord>, AppError> {
        scan(&self.bans)
    }

    async fn insert_license(&self, license: &License) -> Result<bool, AppError> {
        let swapped = self.licenses.compare_and_swap(
            license.code.as_bytes(),
            None as Option<&[u8]>,
            Some(encode(license)?),
        )?;
        Ok(swapped.is_ok())
    }

    async fn get_license(&self, code: &str) -> Result<Option<License>, AppError> {
        self.licenses
            .get(code.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn activate_license(
        &self,
        code: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<ActivationOutcome, AppError> {
        let start = Instant::now();
        loop {
            let Some(current) = self.licenses.get(code.as_bytes())? else {
                return Ok(ActivationOutcome::NotFound);
            };
            let license: License = decode(&current)?;
            if license.is_activated() {
                return Ok(ActivationOutcome::AlreadyActivated);
            }
            let next = license.activated(user_id, at);
            // Succeeds only if nobody rewrote the record since we read it.
            match self
                .licenses
                .compare_and_swap(code.as_bytes(), Some(&current), Some(encode(&next)?))?
            {
                Ok(()) => {
                    metrics::record_storage_latency("activate_license_sled", start);
                    return Ok(ActivationOutcome::Activated(next));
                }
                Err(_) => continue,
            }
        }
    }

    async fn list_licenses(&self) -> Result<Vec<License>, AppError> {
        scan(&self.licenses)
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), AppError> {
        self.users.insert(user.id.as_bytes(), encode(user)?)?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        self.users
            .get(id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    async fn delete_user(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.users.remove(id.as_bytes())?.is_some())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        scan(&self.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn license_insert_is_conditional() {
        let store = SledStorage::temporary().unwrap();
        let license = License::new("ABC123".into(), "admin".into(), Utc::now());
        assert!(store.insert_license(&license).await.unwrap());
        assert!(!store.insert_license(&license).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_activation_commits_once() {
        let store = Arc::new(SledStorage::temporary().unwrap());
        let license = License::new("ABC123".into(), "admin".into(), Utc::now());
        store.insert_license(&license).await.unwrap();

        let a = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.activate_license("ABC123", "user1", Utc::now()).await })
        };
        let b = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.activate_license("ABC123", "user2", Utc::now()).await })
        };
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        let winner = match (&a, &b) {
            (ActivationOutcome::Activated(_), ActivationOutcome::AlreadyActivated) => "user1",
            (ActivationOutcome::AlreadyActivated, ActivationOutcome::Activated(_)) => "user2",
            other => panic!("expected exactly one activation, got {:?}", other),
        };
        let stored = store.get_license("ABC123").await.unwrap().unwrap();
        assert_eq!(stored.activated_by.as_deref(), Some(winner));
    }

    #[tokio::test]
    async fn users_and_bans_round_trip() {
        let store = SledStorage::temporary().unwrap();
        let user = UserRecord {
            id: "user1".into(),
            license_code: None,
            activated_at: None,
            last_ip: Some("203.0.113.5".into()),
            vpn_flagged: false,
            created_at: Utc::now(),
        };
        store.upsert_user(&user).await.unwrap();
        assert_eq!(store.get_user("user1").await.unwrap(), Some(user));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
        assert!(store.delete_user("user1").await.unwrap());
        assert!(store.list_users().await.unwrap().is_empty());

        let record = BanRecord {
            subject: BanSubject::Ip("198.51.100.9".parse().unwrap()),
            reason: "abuse".into(),
            banned_by: "admin".into(),
            banned_at: Utc::now(),
        };
        store.put_ban(&record).await.unwrap();
        assert_eq!(store.get_ban(&record.subject).await.unwrap(), Some(record.clone()));
        assert_eq!(store.list_bans().await.unwrap(), vec![record]);
    }
}
