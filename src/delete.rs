use std::fmt;

use tracing::{debug, error, info, warn};

use crate::migrate::backoff::{BackoffKind, RetryPolicy};
use crate::migrate::log::LogEntry;
use crate::remote::{ApiError, ErrorKind, RemoteUser};
use crate::state::AppState;

/// Page size used when listing remote users.
pub const PAGE_LIMIT: usize = 500;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteSummary {
    pub found: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl fmt::Display for DeleteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} users found", self.found)?;
        writeln!(f, "{} users deleted", self.deleted)?;
        write!(f, "{} users failed to delete", self.failed)
    }
}

/// Fetch every remote user, one page at a time, until a short page.
pub async fn fetch_all(app: &AppState) -> Result<Vec<RemoteUser>, ApiError> {
    let mut users = Vec::new();
    let mut offset = 0;
    loop {
        let page = app.api.list_users(PAGE_LIMIT, offset).await?;
        let len = page.len();
        debug!(offset, len, "fetched user page");
        users.extend(page);
        if len < PAGE_LIMIT {
            return Ok(users);
        }
        offset += PAGE_LIMIT;
    }
}

/// Delete every user of the target instance.
pub async fn delete_all(app: &AppState) -> anyhow::Result<DeleteSummary> {
    let users = fetch_all(app).await?;
    info!(total = users.len(), "deleting users");

    let cfg = &app.config.migration;
    let policy = RetryPolicy {
        kind: cfg.backoff.unwrap_or(BackoffKind::Fixed),
        base: cfg.retry_delay,
        max_retries: cfg.max_retries,
    };

    let mut summary = DeleteSummary {
        found: users.len(),
        ..DeleteSummary::default()
    };
    for (i, user) in users.iter().enumerate() {
        if i > 0 && !cfg.delay.is_zero() {
            tokio::time::sleep(cfg.delay).await;
        }
        match delete_one(app, &user.id, &policy).await {
            Ok(()) => summary.deleted += 1,
            Err(err) => {
                error!(id = %user.id, error = %err, "error deleting user");
                app.log
                    .append(LogEntry::UserDeletionError {
                        user_id: user.id.clone(),
                        status: err.status(),
                        error: err.detail(),
                    })
                    .await;
                summary.failed += 1;
            }
        }
        if (i + 1) % 100 == 0 {
            info!(done = i + 1, total = users.len(), "deletion progress");
        }
    }
    Ok(summary)
}

async fn delete_one(app: &AppState, id: &str, policy: &RetryPolicy) -> Result<(), ApiError> {
    let mut retry = 0;
    loop {
        match app.api.delete_user(id).await {
            Err(err) if err.kind() == ErrorKind::RateLimited && retry < policy.max_retries => {
                let cooldown = policy.delay_for(retry);
                warn!(
                    id,
                    retry = retry + 1,
                    cooldown_ms = cooldown.as_millis() as u64,
                    "rate limited; waiting before retry"
                );
                tokio::time::sleep(cooldown).await;
                retry += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod delete_tests {
    use super::*;
    use crate::remote::fake::{rate_limited, server_error, FakeUserApi};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn deletes_across_pages() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeUserApi::new());
        for i in 0..(PAGE_LIMIT + 3) {
            api.seed_user(&format!("user_{i}"), None);
        }
        let app = AppState::fake(api.clone(), dir.path());

        let summary = delete_all(&app).await.unwrap();
        assert_eq!(summary.found, PAGE_LIMIT + 3);
        assert_eq!(summary.deleted, PAGE_LIMIT + 3);
        assert_eq!(summary.failed, 0);
        assert!(api.users().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_delete_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeUserApi::new());
        api.seed_user("user_a", Some("a"));
        api.script("user_a", vec![rate_limited(), rate_limited()]);
        let app = AppState::fake(api.clone(), dir.path());

        let summary = delete_all(&app).await.unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(api.deleted(), vec!["user_a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_logged_and_do_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeUserApi::new());
        api.seed_user("user_a", None);
        api.seed_user("user_b", None);
        api.fail_always("user_a", server_error());
        let app = AppState::fake(api.clone(), dir.path());

        let summary = delete_all(&app).await.unwrap();
        assert_eq!(summary, DeleteSummary { found: 2, deleted: 1, failed: 1 });

        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(app.log.error_path()).unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["type"], "User Deletion Error");
        assert_eq!(entries[0]["userId"], "user_a");
        assert_eq!(entries[0]["status"], 500);
    }

    #[tokio::test]
    async fn empty_instance_deletes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let app = AppState::fake(Arc::new(FakeUserApi::new()), dir.path());
        let summary = delete_all(&app).await.unwrap();
        assert_eq!(summary, DeleteSummary::default());
    }
}
