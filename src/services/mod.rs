pub mod admin_auth;
pub mod ban_registry;
pub mod circuit_breaker;
pub mod ip_resolver;
pub mod license;
pub mod metrics;
pub mod rate_limiter;
pub mod reputation;
pub mod request_validator;
pub mod storage;
pub mod vpn_classifier;
