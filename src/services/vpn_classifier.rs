use moka::future::Cache;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{
    config::reputation::ReputationConfig,
    services::{
        circuit_breaker::CircuitBreaker,
        metrics,
        reputation::{AbuseIpDbClient, ReputationError, ReputationReport, ReputationSource},
    },
    types::VpnClassification,
};

#[derive(Debug, Clone)]
pub struct CachedClassification {
    pub classification: VpnClassification,
    pub fetched_at: Instant,
}

/// Fail-open VPN/proxy classification. Every path out of `classify` yields a
/// classification; upstream trouble only ever downgrades it to "not a VPN".
pub struct VpnClassifier {
    source: Option<Arc<dyn ReputationSource>>,
    cache: Cache<IpAddr, CachedClassification>,
    breaker: CircuitBreaker,
    timeout: Duration,
    abuse_report_threshold: u32,
}

impl VpnClassifier {
    pub fn new(source: Option<Arc<dyn ReputationSource>>, config: &ReputationConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();
        Self {
            source,
            cache,
            breaker: CircuitBreaker::new(
                config.max_failures,
                Duration::from_secs(config.retry_interval_secs),
            ),
            timeout: Duration::from_millis(config.timeout_ms),
            abuse_report_threshold: config.abuse_report_threshold,
        }
    }

    /// Wires the AbuseIPDB client when a key is configured.
    pub fn from_config(config: &ReputationConfig) -> Result<Self, ReputationError> {
        let source: Option<Arc<dyn ReputationSource>> = match config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {
                Some(Arc::new(AbuseIpDbClient::new(config, key.trim().to_string())?))
            }
            _ => {
                tracing::warn!("No reputation API key configured; VPN checks will always pass");
                None
            }
        };
        Ok(Self::new(source, config))
    }

    pub fn is_configured(&self) -> bool {
        self.source.is_some()
    }

    pub async fn classify(&self, ip: IpAddr) -> VpnClassification {
        let Some(source) = &self.source else {
            metrics::record_vpn_lookup("unconfigured");
            return VpnClassification::not_vpn();
        };

        if let Some(hit) = self.cache.get(&ip).await {
            metrics::record_vpn_lookup("cache_hit");
            tracing::debug!(%ip, age_ms = hit.fetched_at.elapsed().as_millis() as u64, "VPN classification cache hit");
            return hit.classification;
        }

        if !self.breaker.should_try() {
            metrics::record_vpn_lookup("circuit_open");
            return VpnClassification::not_vpn();
        }

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, source.lookup(ip)).await {
            Ok(result) => result,
            Err(_) => Err(ReputationError::Timeout(self.timeout)),
        };

        match result {
            Ok(report) => {
                self.breaker.record_success();
                metrics::record_upstream_latency("ok", start);
                metrics::record_vpn_lookup("upstream");
                let classification = self.interpret(&report);
                self.cache
                    .insert(
                        ip,
                        CachedClassification {
                            classification: classification.clone(),
                            fetched_at: Instant::now(),
                        },
                    )
                    .await;
                classification
            }
            Err(err) => {
                self.breaker.record_failure();
                let outcome = match err {
                    ReputationError::Timeout(_) => "timeout",
                    _ => "error",
                };
                metrics::record_upstream_latency(outcome, start);
                metrics::record_vpn_lookup(outcome);
                tracing::warn!(%ip, error = %err, "Reputation lookup failed; treating address as not a VPN");
                VpnClassification::not_vpn()
            }
        }
    }

    fn interpret(&self, report: &ReputationReport) -> VpnClassification {
        VpnClassification {
            is_vpn: report.is_data_center() || report.total_reports > self.abuse_report_threshold,
            provider: report.usage_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Report(ReputationReport),
        Fail,
        Hang,
    }

    struct FakeSource {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReputationSource for FakeSource {
        async fn lookup(&self, _ip: IpAddr) -> Result<ReputationReport, ReputationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Report(report) => Ok(report.clone()),
                Behaviour::Fail => Err(ReputationError::Status(503)),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(ReputationReport::default())
                }
            }
        }
    }

    fn config() -> ReputationConfig {
        ReputationConfig {
            timeout_ms: 100,
            max_failures: 2,
            retry_interval_secs: 3600,
            ..ReputationConfig::default()
        }
    }

    fn report(usage: &str, reports: u32) -> ReputationReport {
        ReputationReport {
            usage_type: Some(usage.to_string()),
            total_reports: reports,
        }
    }

    fn ip() -> IpAddr {
        "203.0.113.5".parse().unwrap()
    }

    #[tokio::test]
    async fn missing_credential_is_never_a_vpn() {
        let classifier = VpnClassifier::from_config(&ReputationConfig::default()).unwrap();
        assert!(!classifier.is_configured());
        assert_eq!(classifier.classify(ip()).await, VpnClassification::not_vpn());
    }

    #[tokio::test]
    async fn data_center_usage_is_flagged() {
        let source = FakeSource::new(Behaviour::Report(report("Data Center/Web Hosting/Transit", 0)));
        let classifier = VpnClassifier::new(Some(source), &config());
        let result = classifier.classify(ip()).await;
        assert!(result.is_vpn);
        assert_eq!(result.provider.as_deref(), Some("Data Center/Web Hosting/Transit"));
    }

    #[tokio::test]
    async fn report_count_threshold_is_strict() {
        let at_threshold = VpnClassifier::new(
            Some(FakeSource::new(Behaviour::Report(report("Fixed Line ISP", 5)))),
            &config(),
        );
        let result = at_threshold.classify(ip()).await;
        assert!(!result.is_vpn);
        assert_eq!(result.provider.as_deref(), Some("Fixed Line ISP"));

        let over = VpnClassifier::new(
            Some(FakeSource::new(Behaviour::Report(report("Fixed Line ISP", 6)))),
            &config(),
        );
        let result = over.classify(ip()).await;
        assert!(result.is_vpn);
        assert_eq!(result.provider.as_deref(), Some("Fixed Line ISP"));
    }

    #[tokio::test]
    async fn residential_usage_keeps_its_label() {
        let source = FakeSource::new(Behaviour::Report(report("Fixed Line ISP", 0)));
        let classifier = VpnClassifier::new(Some(source), &config());
        assert_eq!(
            classifier.classify(ip()).await,
            VpnClassification {
                is_vpn: false,
                provider: Some("Fixed Line ISP".into()),
            }
        );
    }

    #[tokio::test]
    async fn successful_lookups_are_cached() {
        let source = FakeSource::new(Behaviour::Report(report("Data Center", 0)));
        let classifier = VpnClassifier::new(Some(source.clone()), &config());
        assert!(classifier.classify(ip()).await.is_vpn);
        assert!(classifier.classify(ip()).await.is_vpn);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn upstream_failure_fails_open_and_is_not_cached() {
        let source = FakeSource::new(Behaviour::Fail);
        let classifier = VpnClassifier::new(Some(source.clone()), &config());
        assert!(!classifier.classify(ip()).await.is_vpn);
        assert!(!classifier.classify(ip()).await.is_vpn);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn slow_upstream_times_out_to_not_vpn() {
        let source = FakeSource::new(Behaviour::Hang);
        let classifier = VpnClassifier::new(Some(source), &config());
        let started = Instant::now();
        assert!(!classifier.classify(ip()).await.is_vpn);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn open_breaker_skips_the_upstream() {
        let source = FakeSource::new(Behaviour::Fail);
        let classifier = VpnClassifier::new(Some(source.clone()), &config());
        for _ in 0..5 {
            assert!(!classifier.classify(ip()).await.is_vpn);
        }
        assert_eq!(source.calls(), 2);
    }
}
