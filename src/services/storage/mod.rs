//! Access-pattern contract for the three shared registries (bans, licenses,
//! users). Backends differ in durability only; the atomicity guarantees are
//! part of the contract.
pub mod memory;
pub mod sled;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    config::storage::{StorageBackend, StorageConfig},
    errors::AppError,
    types::{ActivationOutcome, BanRecord, BanSubject, License, UserRecord},
};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_ban(&self, subject: &BanSubject) -> Result<Option<BanRecord>, AppError>;
    /// Inserts or replaces the record for `record.subject`. Visible to every
    /// subsequent `get_ban` once this returns.
    async fn put_ban(&self, record: &BanRecord) -> Result<(), AppError>;
    async fn remove_ban(&self, subject: &BanSubject) -> Result<bool, AppError>;
    async fn list_bans(&self) -> Result<Vec<BanRecord>, AppError>;

    /// Returns `false` without writing when the code already exists.
    async fn insert_license(&self, license: &License) -> Result<bool, AppError>;
    async fn get_license(&self, code: &str) -> Result<Option<License>, AppError>;
    /// Atomic check-and-set of `unused -> activated`. Exactly one concurrent
    /// caller per code observes `Activated`.
    async fn activate_license(
        &self,
        code: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<ActivationOutcome, AppError>;
    async fn list_licenses(&self) -> Result<Vec<License>, AppError>;

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), AppError>;
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, AppError>;
    async fn delete_user(&self, id: &str) -> Result<bool, AppError>;
    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError>;
}

pub fn open(config: &StorageConfig) -> Result<Arc<dyn Storage>, AppError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(memory::MemoryStorage::new())),
        StorageBackend::Sled => Ok(Arc::new(sled::SledStorage::open(config)?)),
    }
}
