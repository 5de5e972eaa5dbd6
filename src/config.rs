use dotenvy::dotenv;
use std::env;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub db_host:     String,
    pub db_port:     u16,
    pub db_name:     String,
    pub db_user:     String,
    pub db_password: String,

    // Backend
    pub backend_host: String,
    pub backend_port: u16,

    // App
    pub app_env: String,

    // CRM / HR external collaborators (§6)
    pub crm_base_url: String,
    pub hr_base_url:  String,

    // Notification (allocation-assigned email, §4.5 step 7)
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub smtp_from: String,

    // Engine defaults (§3, §4.3, §4.4)
    pub horizon_weeks: u32,
    pub buffer_weeks: u32,
    pub default_prestart_weeks: u32,

    // Allocator concurrency & resilience (§5, §4.5)
    pub max_concurrent_adviser_lookups: usize,
    pub crm_retry_attempts: u32,
    pub crm_retry_base_ms: u64,
    pub crm_retry_factor: u64,
    pub crm_retry_cap_ms: u64,
    pub store_call_deadline_secs: u64,
    pub bulk_call_deadline_secs: u64,
    pub allocation_deadline_secs: u64,

    // Store cache TTL (§5 — "no indefinite caches")
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        fn require(key: &str) -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        }

        fn parse_port(key: &str, default: u16) -> Result<u16, ConfigError> {
            match env::var(key) {
                Ok(raw) => raw
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
                Err(_) => Ok(default),
            }
        }

        fn parse_u32(key: &str, default: u32) -> u32 {
            env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }

        fn parse_u64(key: &str, default: u64) -> u64 {
            env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }

        fn parse_usize(key: &str, default: usize) -> usize {
            env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
        }

        Ok(Self {
            db_host:     env::var("DB_HOST").unwrap_or_else(|_| "db".into()),
            db_port:     parse_port("DB_PORT", 3306)?,
            db_name:     require("DB_NAME")?,
            db_user:     require("DB_USER")?,
            db_password: require("DB_PASSWORD")?,

            backend_host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            backend_port: parse_port("BACKEND_PORT", 8080)?,

            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),

            crm_base_url: env::var("CRM_BASE_URL").unwrap_or_else(|_| "https://crm.internal".into()),
            hr_base_url:  env::var("HR_BASE_URL").unwrap_or_else(|_| "https://hr.internal".into()),

            smtp_host:     env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port:     parse_u32("SMTP_PORT", 587) as u16,
            smtp_user:     env::var("SMTP_USER").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_from:     env::var("SMTP_FROM").unwrap_or_else(|_| "allocations@pivot.internal".into()),

            horizon_weeks:          parse_u32("HORIZON_WEEKS", 52),
            buffer_weeks:           parse_u32("BUFFER_WEEKS", 2),
            default_prestart_weeks: parse_u32("DEFAULT_PRESTART_WEEKS", 3),

            max_concurrent_adviser_lookups: parse_usize("MAX_CONCURRENT_ADVISER_LOOKUPS", 16),
            crm_retry_attempts: parse_u32("CRM_RETRY_ATTEMPTS", 3),
            crm_retry_base_ms:  parse_u64("CRM_RETRY_BASE_MS", 500),
            crm_retry_factor:   parse_u64("CRM_RETRY_FACTOR", 2),
            crm_retry_cap_ms:   parse_u64("CRM_RETRY_CAP_MS", 4000),
            store_call_deadline_secs: parse_u64("STORE_CALL_DEADLINE_SECS", 10),
            bulk_call_deadline_secs:  parse_u64("BULK_CALL_DEADLINE_SECS", 30),
            allocation_deadline_secs: parse_u64("ALLOCATION_DEADLINE_SECS", 60),

            cache_ttl_secs: parse_u64("CACHE_TTL_SECS", 300),
        })
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }
}
