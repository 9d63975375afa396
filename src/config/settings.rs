use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::env;
use validator::Validate;

use super::{
    rate_limit::RateLimitConfig,
    reputation::ReputationConfig,
    security::{SecurityConfig, DEV_ADMIN_SECRET},
    storage::StorageConfig,
};

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct Settings {
    pub environment: String,
    #[validate(range(min = 1))]
    pub port: u16,
    pub ping_message: String,
    /// Allowed cross-origin sources; empty mirrors the caller's origin.
    pub cors_origins: Vec<String>,
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    #[validate(nested)]
    pub security: SecurityConfig,
    #[validate(nested)]
    pub reputation: ReputationConfig,
    #[validate(nested)]
    pub storage: StorageConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 8080,
            ping_message: "ping".to_string(),
            cors_origins: vec![],
            rate_limit: RateLimitConfig::default(),
            security: SecurityConfig::default(),
            reputation: ReputationConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Settings {
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn list_var(name: &str) -> Option<Vec<String>> {
    non_empty_var(name).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// Loads settings from defaults, the `.env.*` file for the current
/// `ENVIRONMENT`, then the process environment (`__` separates nesting,
/// e.g. `RATE_LIMIT__WINDOW_SIZE_SECONDS`).
pub fn load() -> Result<Settings, ConfigError> {
    let env = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    let env_file = match env.as_str() {
        "production" => ".env.production",
        _ => ".env.development",
    };

    dotenv::from_filename(env_file).ok();

    let config = Config::builder()
        .add_source(Config::try_from(&Settings::default())?)
        .add_source(
            Environment::default()
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cors_origins")
                .with_list_parse_key("security.admin_emails"),
        )
        .set_override_option("reputation.api_key", non_empty_var("ABUSEIPDB_API_KEY"))?
        .set_override_option("security.admin_jwt_secret", non_empty_var("ADMIN_JWT_SECRET"))?
        .set_override_option("cors_origins", list_var("CORS_ORIGINS"))?
        .set_override_option("security.admin_emails", list_var("ADMIN_EMAILS"))?
        .build()?;

    let mut settings = config
        .try_deserialize::<Settings>()
        .map_err(|e| ConfigError::Message(format!("Failed to deserialize settings: {}", e)))?;

    settings.cors_origins.retain(|origin| !origin.trim().is_empty());
    settings
        .validate()
        .map_err(|e| ConfigError::Message(format!("Invalid settings: {}", e)))?;

    if settings.is_production() && settings.security.admin_jwt_secret == DEV_ADMIN_SECRET {
        return Err(ConfigError::Message(
            "ADMIN_JWT_SECRET must be set in production".to_string(),
        ));
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const CONFIG_VARS: &[&str] = &[
        "ENVIRONMENT",
        "PORT",
        "CORS_ORIGINS",
        "ADMIN_EMAILS",
        "ABUSEIPDB_API_KEY",
        "ADMIN_JWT_SECRET",
    ];

    fn clear_config_vars() {
        for name in CONFIG_VARS {
            // SAFETY: tests touching the environment are #[serial].
            unsafe { env::remove_var(name) };
        }
    }

    #[test]
    fn defaults_pass_validation() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.rate_limit.general_requests_per_window, 100);
        assert_eq!(settings.rate_limit.window_size_seconds, 60);
        assert!(settings.rate_limit.admin_requests_per_window < settings.rate_limit.general_requests_per_window);
        assert_eq!(settings.security.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.reputation.abuse_report_threshold, 5);
    }

    #[test]
    fn nested_validation_errors_surface() {
        let mut settings = Settings::default();
        settings.security.admin_jwt_secret = "short".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.security.injection_patterns = vec!["(unclosed".to_string()];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn defaults_round_trip_through_config_builder() {
        let config = Config::builder()
            .add_source(Config::try_from(&Settings::default()).unwrap())
            .set_override("rate_limit.admin_requests_per_window", 7)
            .unwrap()
            .build()
            .unwrap();
        let settings: Settings = config.try_deserialize().unwrap();
        assert_eq!(settings.rate_limit.admin_requests_per_window, 7);
        assert!(settings.reputation.api_key.is_none());
    }

    #[test]
    #[serial]
    fn load_succeeds_with_plain_environment() {
        clear_config_vars();
        let settings = load().unwrap();
        assert_eq!(settings.port, 8080);
        assert!(settings.cors_origins.is_empty());
        assert!(settings.security.admin_emails.is_empty());
        assert!(settings.reputation.api_key.is_none());
        assert_eq!(settings.security.admin_jwt_secret, DEV_ADMIN_SECRET);
    }

    #[test]
    #[serial]
    fn load_reads_list_variables() {
        clear_config_vars();
        // SAFETY: serialized with the other environment tests.
        unsafe {
            env::set_var("CORS_ORIGINS", "https://a.example, https://b.example");
            env::set_var("ADMIN_EMAILS", "ops@example.com,root@example.com");
        }
        let settings = load();
        clear_config_vars();
        let settings = settings.unwrap();
        assert_eq!(settings.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(
            settings.security.admin_emails,
            vec!["ops@example.com", "root@example.com"]
        );
    }

    #[test]
    #[serial]
    fn production_requires_admin_secret() {
        clear_config_vars();
        // SAFETY: serialized with the other environment tests.
        unsafe { env::set_var("ENVIRONMENT", "production") };
        let result = load();
        clear_config_vars();
        assert!(result.is_err());
    }
}
