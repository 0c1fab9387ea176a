use std::sync::Arc;

use crate::config::AppConfig;
use crate::migrate::log::OutcomeLog;
use crate::remote::{ClerkClient, UserApi};

/// Everything a command needs: configuration, the remote API and the run log.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub api: Arc<dyn UserApi>,
    pub log: OutcomeLog,
}

impl AppState {
    pub fn init(config: AppConfig) -> anyhow::Result<Self> {
        let api = Arc::new(ClerkClient::new(&config.api)?) as Arc<dyn UserApi>;
        let log = OutcomeLog::for_run(&config.log_dir);
        Ok(Self::from_parts(Arc::new(config), api, log))
    }

    pub fn from_parts(config: Arc<AppConfig>, api: Arc<dyn UserApi>, log: OutcomeLog) -> Self {
        Self { config, api, log }
    }

    #[cfg(test)]
    pub fn fake(api: Arc<dyn UserApi>, log_dir: &std::path::Path) -> Self {
        let config = AppConfig::from_lookup(|key| match key {
            "CLERK_SECRET_KEY" => Some("sk_live_test".into()),
            "LOG_DIR" => Some(log_dir.display().to_string()),
            _ => None,
        })
        .expect("test config");
        let log = OutcomeLog::new(log_dir, "test-run");
        Self::from_parts(Arc::new(config), api, log)
    }
}
