use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RateLimitConfig {
    #[validate(range(min = 1))]
    pub general_requests_per_window: u32,
    #[validate(range(min = 1))]
    pub admin_requests_per_window: u32,
    #[validate(range(min = 1, max = 3600))]
    pub window_size_seconds: u64,
    // How often stale buckets are swept out of memory
    #[validate(range(min = 1, max = 3600))]
    pub gc_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_requests_per_window: 100,
            admin_requests_per_window: 20,
            window_size_seconds: 60,
            gc_interval_seconds: 30,
        }
    }
}
