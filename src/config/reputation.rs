use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ReputationConfig {
    /// AbuseIPDB key. Absent means every lookup resolves to "not a VPN".
    pub api_key: Option<String>,
    #[validate(url)]
    pub endpoint: String,
    #[validate(range(min = 100, max = 30_000))]
    pub timeout_ms: u64,
    #[validate(range(min = 1, max = 365))]
    pub max_age_days: u32,
    pub abuse_report_threshold: u32,
    #[validate(range(min = 60))]
    pub cache_ttl_seconds: u64,
    #[validate(range(min = 100))]
    pub cache_capacity: u64,
    #[validate(range(min = 1))]
    pub max_failures: u32,
    #[validate(range(min = 1))]
    pub retry_interval_secs: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.abuseipdb.com/api/v2/check".to_string(),
            timeout_ms: 3_000,
            max_age_days: 90,
            abuse_report_threshold: 5,
            cache_ttl_seconds: 3_600,
            cache_capacity: 10_000,
            max_failures: 5,
            retry_interval_secs: 30,
        }
    }
}
