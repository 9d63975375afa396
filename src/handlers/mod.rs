pub mod admin;
pub mod health;
pub mod ip;
pub mod license;
pub mod metrics;

use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    config::Settings,
    errors::AppError,
    services::{
        admin_auth::AdminAuthenticator,
        ban_registry::BanRegistry,
        license::LicenseManager,
        rate_limiter::RateLimiter,
        request_validator::RequestValidator,
        storage::{self, Storage},
        vpn_classifier::VpnClassifier,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub clock: Arc<dyn Clock>,
    pub storage: Arc<dyn Storage>,
    pub rate_limiter: Arc<RateLimiter>,
    pub bans: Arc<BanRegistry>,
    pub licenses: Arc<LicenseManager>,
    pub classifier: Arc<VpnClassifier>,
    pub admin_auth: Arc<AdminAuthenticator>,
    pub request_validator: Arc<RequestValidator>,
}

impl AppState {
    pub fn new(config: Settings) -> Result<Self, AppError> {
        let storage = storage::open(&config.storage)?;
        let classifier = VpnClassifier::from_config(&config.reputation)
            .map_err(|e| AppError::Internal(format!("Failed to build reputation client: {}", e)))?;
        Self::from_parts(config, storage, Arc::new(SystemClock), classifier)
    }

    /// Assembles the services over caller-supplied storage, clock and
    /// classifier.
    pub fn from_parts(
        config: Settings,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        classifier: VpnClassifier,
    ) -> Result<Self, AppError> {
        let request_validator = RequestValidator::new(&config.security)
            .map_err(|e| AppError::Internal(format!("Invalid injection pattern: {}", e)))?;
        Ok(Self {
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit, clock.clone())),
            bans: Arc::new(BanRegistry::new(storage.clone(), clock.clone())),
            licenses: Arc::new(LicenseManager::new(storage.clone(), clock.clone())),
            classifier: Arc::new(classifier),
            admin_auth: Arc::new(AdminAuthenticator::new(&config.security)),
            request_validator: Arc::new(request_validator),
            config: Arc::new(config),
            clock,
            storage,
        })
    }
}
