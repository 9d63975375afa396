use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::validator::{validate_email_list, validate_pattern_list};

pub const DEV_ADMIN_SECRET: &str = "chatgate-development-admin-secret-do-not-deploy";

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct SecurityConfig {
    /// HMAC secret the external identity provider signs admin credentials with.
    #[validate(length(min = 32))]
    pub admin_jwt_secret: String,
    /// When non-empty, only credentials whose `email` claim is listed are admins.
    #[validate(custom(function = "validate_email_list"))]
    pub admin_emails: Vec<String>,
    #[validate(range(min = 1024, max = 104_857_600))]
    pub max_body_bytes: usize,
    #[validate(length(min = 1))]
    #[validate(custom(function = "validate_pattern_list"))]
    pub injection_patterns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            admin_jwt_secret: DEV_ADMIN_SECRET.to_string(),
            admin_emails: vec![],
            max_body_bytes: 10 * 1024 * 1024, // 10 MiB
            injection_patterns: default_injection_patterns(),
        }
    }
}

pub fn default_injection_patterns() -> Vec<String> {
    [
        r"(?i)<\s*script",
        r"(?i)javascript\s*:",
        r"(?i)\bon(load|error|click|mouseover|focus)\s*=",
        r"(?i)\beval\s*\(",
        r"(?i)document\.cookie",
        r"\$\([^)]*\)",
        r"(?i);\s*(rm|wget|curl|bash|sh|nc)\s",
        r"(?i)\bunion\s+(all\s+)?select\b",
        r"(?i)\bdrop\s+table\b",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}
