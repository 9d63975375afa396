use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use validator::Validate;

use crate::validator::{validate_identifier, validate_ip, validate_license_code};

/// What a ban applies to. A user id and an IP never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum BanSubject {
    User(String),
    Ip(IpAddr),
}

impl BanSubject {
    pub fn storage_key(&self) -> String {
        match self {
            BanSubject::User(id) => format!("user:{}", id),
            BanSubject::Ip(ip) => format!("ip:{}", ip),
        }
    }
}

impl fmt::Display for BanSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRecord {
    pub subject: BanSubject,
    pub reason: String,
    pub banned_by: String,
    pub banned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Unused,
    Activated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub code: String,
    pub status: LicenseStatus,
    pub activated_by: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl License {
    pub fn new(code: String, created_by: String, created_at: DateTime<Utc>) -> Self {
        Self {
            code,
            status: LicenseStatus::Unused,
            activated_by: None,
            activated_at: None,
            created_at,
            created_by,
        }
    }

    pub fn is_activated(&self) -> bool {
        self.status == LicenseStatus::Activated
    }

    /// The single unused -> activated transition. Callers must hold whatever
    /// exclusion their store provides for this code.
    pub fn activated(&self, user_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            status: LicenseStatus::Activated,
            activated_by: Some(user_id.to_string()),
            activated_at: Some(at),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    Activated(License),
    AlreadyActivated,
    NotFound,
}

impl ActivationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationOutcome::Activated(_) => "activated",
            ActivationOutcome::AlreadyActivated => "already_activated",
            ActivationOutcome::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub license_code: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub last_ip: Option<String>,
    pub vpn_flagged: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnClassification {
    #[serde(rename = "isVPN")]
    pub is_vpn: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl VpnClassification {
    pub fn not_vpn() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    pub id: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

// ---- request / response bodies ----

/// Envelope for admin mutations.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Removed {
    pub subject: String,
    pub removed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IpResponse {
    pub ip: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IpAddressRequest {
    #[validate(custom(function = "validate_ip"))]
    pub ip_address: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActivateLicenseRequest {
    #[validate(custom(function = "validate_license_code"))]
    pub code: String,
    #[validate(custom(function = "validate_identifier"))]
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivateLicenseResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AdminVerifyRequest {
    #[validate(length(min = 1, max = 8192))]
    pub credential: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BanUserRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub user_id: String,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BanIpRequest {
    #[validate(custom(function = "validate_ip"))]
    pub ip_address: String,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    #[validate(custom(function = "validate_identifier"))]
    pub user_id: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct CreateLicenseRequest {
    #[validate(custom(function = "validate_license_code"))]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    #[serde(flatten)]
    pub user: UserRecord,
    pub banned: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_users: usize,
    pub banned_users: usize,
    pub banned_ips: usize,
    pub total_licenses: usize,
    pub activated_licenses: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ban_subject_wire_format_is_tagged() {
        let subject = BanSubject::Ip("198.51.100.9".parse().unwrap());
        let json = serde_json::to_value(&subject).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ip", "value": "198.51.100.9"}));
        assert_eq!(subject.storage_key(), "ip:198.51.100.9");
        assert_ne!(
            BanSubject::User("198.51.100.9".into()).storage_key(),
            subject.storage_key()
        );
    }

    #[test]
    fn vpn_classification_omits_missing_provider() {
        let json = serde_json::to_string(&VpnClassification::not_vpn()).unwrap();
        assert_eq!(json, r#"{"isVPN":false}"#);
    }

    #[test]
    fn activation_is_a_single_transition() {
        let now = Utc::now();
        let license = License::new("ABC123".into(), "admin".into(), now);
        assert!(!license.is_activated());
        let activated = license.activated("user1", now);
        assert!(activated.is_activated());
        assert_eq!(activated.activated_by.as_deref(), Some("user1"));
        assert_eq!(activated.created_by, "admin");
    }
}
