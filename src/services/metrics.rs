use once_cell::sync::OnceCell;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};
use std::time::Instant;

pub struct GatewayMetrics {
    pub rejections: IntCounterVec,
    pub rate_limited: IntCounterVec,
    pub vpn_lookups: IntCounterVec,
    pub license_activations: IntCounterVec,
    pub upstream_latency: HistogramVec,
    pub storage_latency: HistogramVec,
    pub storage_failures: IntCounterVec,
}

static METRICS: OnceCell<GatewayMetrics> = OnceCell::new();

/// Registers the gateway's collectors in the default registry. Safe to call
/// more than once; only the first call registers.
pub fn init_metrics() -> Result<&'static GatewayMetrics, prometheus::Error> {
    METRICS.get_or_try_init(|| {
        let metrics = GatewayMetrics {
            rejections: IntCounterVec::new(
                Opts::new("requests_rejected_total", "Requests rejected before reaching a handler"),
                &["reason"],
            )?,
            rate_limited: IntCounterVec::new(
                Opts::new("rate_limit_exceeded_total", "Requests exceeding the rate limit"),
                &["route_class"],
            )?,
            vpn_lookups: IntCounterVec::new(
                Opts::new("vpn_lookups_total", "VPN classification lookups by outcome"),
                &["outcome"],
            )?,
            license_activations: IntCounterVec::new(
                Opts::new("license_activations_total", "License activation attempts by outcome"),
                &["outcome"],
            )?,
            upstream_latency: HistogramVec::new(
                HistogramOpts::new("reputation_latency_seconds", "IP reputation service latency")
                    .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
                &["outcome"],
            )?,
            storage_latency: HistogramVec::new(
                HistogramOpts::new("storage_latency_seconds", "Registry storage latency")
                    .buckets(vec![0.0001, 0.001, 0.01, 0.1]),
                &["operation"],
            )?,
            storage_failures: IntCounterVec::new(
                Opts::new("storage_failures_total", "Storage writes that failed after a committed change"),
                &["operation"],
            )?,
        };

        let registry = prometheus::default_registry();
        registry.register(Box::new(metrics.rejections.clone()))?;
        registry.register(Box::new(metrics.rate_limited.clone()))?;
        registry.register(Box::new(metrics.vpn_lookups.clone()))?;
        registry.register(Box::new(metrics.license_activations.clone()))?;
        registry.register(Box::new(metrics.upstream_latency.clone()))?;
        registry.register(Box::new(metrics.storage_latency.clone()))?;
        registry.register(Box::new(metrics.storage_failures.clone()))?;
        Ok(metrics)
    })
}

pub fn record_rejection(reason: &'static str) {
    if let Some(m) = METRICS.get() {
        m.rejections.with_label_values(&[reason]).inc();
    }
}

pub fn record_rate_limited(route_class: &'static str) {
    if let Some(m) = METRICS.get() {
        m.rate_limited.with_label_values(&[route_class]).inc();
    }
}

pub fn record_vpn_lookup(outcome: &'static str) {
    if let Some(m) = METRICS.get() {
        m.vpn_lookups.with_label_values(&[outcome]).inc();
    }
}

pub fn record_license_activation(outcome: &'static str) {
    if let Some(m) = METRICS.get() {
        m.license_activations.with_label_values(&[outcome]).inc();
    }
}

pub fn record_upstream_latency(outcome: &'static str, start: Instant) {
    if let Some(m) = METRICS.get() {
        m.upstream_latency
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
    }
}

pub fn record_storage_latency(op: &'static str, start: Instant) {
    if let Some(m) = METRICS.get() {
        m.storage_latency
            .with_label_values(&[op])
            .observe(start.elapsed().as_secs_f64());
    }
}

pub fn record_storage_failure(op: &'static str) {
    if let Some(m) = METRICS.get() {
        m.storage_failures.with_label_values(&[op]).inc();
    }
}
