use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::reputation::ReputationConfig;

/// Failures talking to the reputation service. Never surfaced to callers of
/// the gateway; the classifier turns every one of them into "not a VPN".
#[derive(Error, Debug)]
pub enum ReputationError {
    #[error("reputation service timed out after {0:?}")]
    Timeout(Duration),

    #[error("reputation service returned HTTP {0}")]
    Status(u16),

    #[error("reputation request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// What the upstream service says about one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReputationReport {
    pub usage_type: Option<String>,
    pub total_reports: u32,
}

impl ReputationReport {
    pub fn is_data_center(&self) -> bool {
        self.usage_type
            .as_deref()
            .is_some_and(|usage| usage.starts_with("Data Center"))
    }
}

#[async_trait]
pub trait ReputationSource: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<ReputationReport, ReputationError>;
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    data: Option<CheckData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckData {
    usage_type: Option<String>,
    total_reports: Option<u32>,
}

/// AbuseIPDB v2 `check` endpoint.
pub struct AbuseIpDbClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_age_days: u32,
}

impl AbuseIpDbClient {
    pub fn new(config: &ReputationConfig, api_key: String) -> Result<Self, ReputationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
            max_age_days: config.max_age_days,
        })
    }
}

#[async_trait]
impl ReputationSource for AbuseIpDbClient {
    async fn lookup(&self, ip: IpAddr) -> Result<ReputationReport, ReputationError> {
        let response = self
            .http
            .get(&self.endpoint)
            .header("Key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("ipAddress", ip.to_string()),
                ("maxAgeInDays", self.max_age_days.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReputationError::Status(response.status().as_u16()));
        }

        let body: CheckResponse = response.json().await?;
        let data = body.data.unwrap_or(CheckData {
            usage_type: None,
            total_reports: None,
        });
        Ok(ReputationReport {
            usage_type: data.usage_type.filter(|u| !u.is_empty()),
            total_reports: data.total_reports.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_center_usage_types() {
        let report = |usage: Option<&str>| ReputationReport {
            usage_type: usage.map(str::to_string),
            total_reports: 0,
        };
        assert!(report(Some("Data Center")).is_data_center());
        assert!(report(Some("Data Center/Web Hosting/Transit")).is_data_center());
        assert!(!report(Some("Fixed Line ISP")).is_data_center());
        assert!(!report(None).is_data_center());
    }

    #[test]
    fn check_response_parses_partial_payloads() {
        let body: CheckResponse = serde_json::from_str(
            r#"{"data":{"ipAddress":"203.0.113.5","usageType":"Data Center/Web Hosting/Transit","totalReports":12,"isp":"x"}}"#,
        )
        .unwrap();
        let data = body.data.unwrap();
        assert_eq!(data.total_reports, Some(12));

        let empty: CheckResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.data.is_none());
    }
}
