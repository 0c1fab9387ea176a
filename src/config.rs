use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::migrate::backoff::BackoffKind;

pub const DEFAULT_API_URL: &str = "https://api.clerk.com/v1";
pub const DEFAULT_DELAY_MS: u64 = 550;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 10_000;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CLERK_SECRET_KEY is required. Copy .env.example to .env and add your key.")]
    MissingSecretKey,
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
    #[error(
        "the secret key targets a development instance; development instances are limited \
         and do not share their userbase with production. Set IMPORT_TO_DEV_INSTANCE=true \
         to import into it anyway"
    )]
    DevInstance,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub secret_key: String,
    pub base_url: String,
}

impl ApiConfig {
    /// Keys look like `sk_live_...` or `sk_test_...`.
    pub fn targets_production(&self) -> bool {
        self.secret_key.split('_').nth(1) == Some("live")
    }
}

#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub delay: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub offset: usize,
    pub import_to_dev: bool,
    pub concurrency_limit: usize,
    pub backoff: Option<BackoffKind>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub migration: MigrationConfig,
    pub log_dir: PathBuf,
}

fn parse_or<T: FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v.parse::<T>().map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

fn parse_flag(key: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
        }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = lookup("CLERK_SECRET_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingSecretKey)?;
        let api = ApiConfig {
            secret_key,
            base_url: lookup("CLERK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
        };

        let delay_ms = parse_or(
            "DELAY_MS",
            lookup("DELAY_MS").or_else(|| lookup("DELAY")),
            DEFAULT_DELAY_MS,
        )?;
        let retry_delay_ms = parse_or(
            "RETRY_DELAY_MS",
            lookup("RETRY_DELAY_MS"),
            DEFAULT_RETRY_DELAY_MS,
        )?;
        let concurrency_limit = parse_or(
            "CONCURRENCY_LIMIT",
            lookup("CONCURRENCY_LIMIT"),
            DEFAULT_CONCURRENCY_LIMIT,
        )?;
        if concurrency_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "CONCURRENCY_LIMIT",
                value: "0".into(),
            });
        }
        let backoff = match lookup("BACKOFF") {
            None => None,
            Some(v) => Some(v.parse::<BackoffKind>().map_err(|_| ConfigError::Invalid {
                key: "BACKOFF",
                value: v,
            })?),
        };

        let migration = MigrationConfig {
            delay: Duration::from_millis(delay_ms),
            retry_delay: Duration::from_millis(retry_delay_ms),
            max_retries: parse_or("MAX_RETRIES", lookup("MAX_RETRIES"), DEFAULT_MAX_RETRIES)?,
            offset: parse_or("OFFSET", lookup("OFFSET"), 0)?,
            import_to_dev: parse_flag(
                "IMPORT_TO_DEV_INSTANCE",
                lookup("IMPORT_TO_DEV_INSTANCE").or_else(|| lookup("IMPORT_TO_DEV")),
            )?,
            concurrency_limit,
            backoff,
        };

        Ok(Self {
            api,
            migration,
            log_dir: lookup("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
        })
    }

    /// Refuse to write into a development instance unless explicitly allowed.
    pub fn check_target(&self) -> Result<(), ConfigError> {
        if !self.api.targets_production() && !self.migration.import_to_dev {
            return Err(ConfigError::DevInstance);
        }
        Ok(())
    }
}
