//! Field-level validators shared by request DTOs and configuration.
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use std::net::IpAddr;
use validator::ValidationError;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("static email regex")
});

pub const MAX_IDENTIFIER_LEN: usize = 128;

pub fn validate_email_list(emails: &Vec<String>) -> Result<(), ValidationError> {
    for email in emails {
        if !EMAIL_REGEX.is_match(email) {
            let mut error = ValidationError::new("invalid_email");
            error.add_param("value".into(), &email.to_string());
            return Err(error);
        }
    }
    Ok(())
}

pub fn validate_pattern_list(patterns: &Vec<String>) -> Result<(), ValidationError> {
    RegexSet::new(patterns).map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("invalid_pattern");
        err.add_param("reason".into(), &e.to_string());
        err
    })
}

pub fn validate_ip(ip: &str) -> Result<(), ValidationError> {
    if ip.trim().parse::<IpAddr>().is_ok() {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_ip_address");
        err.add_param("value".into(), &ip);
        Err(err)
    }
}

/// User ids come from the external identity provider: opaque, but bounded
/// and restricted to characters that are safe in storage keys and logs.
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    let ok = !id.is_empty()
        && id.len() <= MAX_IDENTIFIER_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '@'));
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_identifier");
        err.add_param("max_length".into(), &MAX_IDENTIFIER_LEN);
        Err(err)
    }
}

pub fn normalize_license_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn validate_license_code(code: &str) -> Result<(), ValidationError> {
    let normalized = normalize_license_code(code);
    let ok = (4..=64).contains(&normalized.len())
        && normalized
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_license_code");
        err.add_param("code".into(), &normalized);
        Err(err)
    }
}
