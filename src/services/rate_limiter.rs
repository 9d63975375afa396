//! Fixed-window admission counters keyed by (client IP, route class).
//!
//! Each key lives in one shard of a `DashMap`; the entry guard makes the
//! read-reset-increment sequence for a key atomic without serializing
//! unrelated clients. A window boundary is a hard reset, so a client may
//! spend a full allowance just before and again just after it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::{clock::Clock, config::rate_limit::RateLimitConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    General,
    Admin,
}

impl RouteClass {
    pub fn for_path(path: &str) -> Self {
        if path == "/admin" || path.starts_with("/admin/") {
            RouteClass::Admin
        } else {
            RouteClass::General
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::General => "general",
            RouteClass::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitBucket {
    pub window_start_ms: i64,
    pub count: u32,
    pub window: Duration,
    pub limit: u32,
}

impl RateLimitBucket {
    fn open(now_ms: i64, policy: RateLimitPolicy) -> Self {
        Self {
            window_start_ms: now_ms,
            count: 1,
            window: policy.window,
            limit: policy.limit,
        }
    }

    fn resets_at_ms(&self) -> i64 {
        self.window_start_ms + self.window.as_millis() as i64
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.resets_at_ms()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }

    /// Whole seconds for a `Retry-After` header; never zero.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Admission::Allowed { .. } => None,
            Admission::Rejected { retry_after } => {
                Some((retry_after.as_millis().div_ceil(1000) as u64).max(1))
            }
        }
    }
}

pub struct RateLimiter {
    buckets: DashMap<(IpAddr, RouteClass), RateLimitBucket>,
    general: RateLimitPolicy,
    admin: RateLimitPolicy,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let window = Duration::from_secs(config.window_size_seconds);
        Self {
            buckets: DashMap::new(),
            general: RateLimitPolicy {
                limit: config.general_requests_per_window,
                window,
            },
            admin: RateLimitPolicy {
                limit: config.admin_requests_per_window,
                window,
            },
            clock,
        }
    }

    pub fn policy(&self, class: RouteClass) -> RateLimitPolicy {
        match class {
            RouteClass::General => self.general,
            RouteClass::Admin => self.admin,
        }
    }

    pub fn admit(&self, ip: IpAddr, class: RouteClass) -> Admission {
        let policy = self.policy(class);
        let now_ms = self.clock.now_millis();

        match self.buckets.entry((ip, class)) {
            Entry::Vacant(slot) => {
                slot.insert(RateLimitBucket::open(now_ms, policy));
                Admission::Allowed {
                    remaining: policy.limit.saturating_sub(1),
                }
            }
            Entry::Occupied(mut slot) => {
                let bucket = slot.get_mut();
                if bucket.is_expired(now_ms) {
                    *bucket = RateLimitBucket::open(now_ms, policy);
                    return Admission::Allowed {
                        remaining: policy.limit.saturating_sub(1),
                    };
                }
                if bucket.count >= bucket.limit {
                    // Clamped so a wall clock stepped backwards cannot push
                    // the wait past one window.
                    let window_ms = bucket.window.as_millis() as i64;
                    let wait_ms = (bucket.resets_at_ms() - now_ms).clamp(1, window_ms.max(1)) as u64;
                    return Admission::Rejected {
                        retry_after: Duration::from_millis(wait_ms),
                    };
                }
                bucket.count += 1;
                Admission::Allowed {
                    remaining: bucket.limit - bucket.count,
                }
            }
        }
    }

    /// Drops buckets whose window has elapsed; they would be reset on their
    /// next hit anyway. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now_ms = self.clock.now_millis();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_expired(now_ms));
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Periodic purge; the task ends once the limiter itself is dropped.
    pub fn spawn_gc(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let evicted = limiter.purge_expired();
                if evicted > 0 {
                    tracing::debug!(
                        evicted,
                        remaining = limiter.tracked_buckets(),
                        "Purged expired rate-limit buckets"
                    );
                }
            }
        })
    }
}
