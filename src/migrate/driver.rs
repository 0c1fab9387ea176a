use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::migrate::backoff::RetryPolicy;
use crate::migrate::log::{LogEntry, OutcomeLog};
use crate::migrate::state::{MigrationOutcome, RunState, RunSummary};
use crate::remote::{ApiError, CreateUserRequest, ErrorKind, RemoteUser, UserApi};
use crate::users::PendingRecord;

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Pause between records in sequential mode.
    pub delay: Duration,
    pub retry: RetryPolicy,
    /// `Some(n)` runs up to `n` creates at once and drops the inter-record delay.
    pub concurrency: Option<usize>,
}

/// Result of one create call, handed from a worker back to the coordinator.
struct Attempt {
    pending: PendingRecord,
    retry: u32,
    result: Result<RemoteUser, ApiError>,
}

enum Step {
    Done,
    Retry(Duration),
}

async fn attempt(
    api: Arc<dyn UserApi>,
    pending: PendingRecord,
    retry: u32,
    cooldown: Duration,
) -> Attempt {
    if !cooldown.is_zero() {
        tokio::time::sleep(cooldown).await;
    }
    let request = CreateUserRequest::from(&pending.record);
    let result = api.create_user(&request).await;
    Attempt {
        pending,
        retry,
        result,
    }
}

/// Creates validated records in the remote system and tallies the outcomes.
pub struct Migrator {
    api: Arc<dyn UserApi>,
    log: OutcomeLog,
    settings: DriverSettings,
}

impl Migrator {
    pub fn new(api: Arc<dyn UserApi>, log: OutcomeLog, settings: DriverSettings) -> Self {
        Self { api, log, settings }
    }

    pub async fn run(&self, state: RunState) -> RunSummary {
        match self.settings.concurrency {
            Some(limit) => self.run_concurrent(state, limit.max(1)).await,
            None => self.run_sequential(state).await,
        }
    }

    async fn run_sequential(&self, mut state: RunState) -> RunSummary {
        let mut first = true;
        while let Some(pending) = state.next_pending() {
            if !first && !self.settings.delay.is_zero() {
                tokio::time::sleep(self.settings.delay).await;
            }
            first = false;

            let mut next = attempt(self.api.clone(), pending, 0, Duration::ZERO).await;
            loop {
                let Attempt {
                    pending,
                    retry,
                    result,
                } = next;
                match self.classify(&mut state, &pending, retry, result).await {
                    Step::Done => break,
                    Step::Retry(cooldown) => {
                        next = attempt(self.api.clone(), pending, retry + 1, cooldown).await;
                    }
                }
            }
        }
        state.into_summary()
    }

    /// The coordinator owns `state`; workers only perform the remote call.
    async fn run_concurrent(&self, mut state: RunState, limit: usize) -> RunSummary {
        let mut workers: JoinSet<Attempt> = JoinSet::new();
        loop {
            while workers.len() < limit {
                let Some(pending) = state.next_pending() else {
                    break;
                };
                workers.spawn(attempt(self.api.clone(), pending, 0, Duration::ZERO));
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };
            match joined {
                Ok(Attempt {
                    pending,
                    retry,
                    result,
                }) => {
                    if let Step::Retry(cooldown) =
                        self.classify(&mut state, &pending, retry, result).await
                    {
                        // the record keeps its slot and its claim while cooling down
                        workers.spawn(attempt(self.api.clone(), pending, retry + 1, cooldown));
                    }
                }
                Err(e) => {
                    error!(error = %e, "migration worker failed");
                    state.worker_lost();
                }
            }
        }
        state.into_summary()
    }

    async fn classify(
        &self,
        state: &mut RunState,
        pending: &PendingRecord,
        retry: u32,
        result: Result<RemoteUser, ApiError>,
    ) -> Step {
        let user_id = pending.record.user_id.as_str();
        let outcome = match result {
            Ok(user) => {
                debug!(user_id, remote_id = %user.id, "user migrated");
                MigrationOutcome::Created
            }
            Err(err) => match err.kind() {
                ErrorKind::Conflict => {
                    info!(user_id, "user already exists");
                    self.log
                        .append(LogEntry::AlreadyExists {
                            user_id: user_id.to_string(),
                            status: err.status(),
                            error: err.detail(),
                        })
                        .await;
                    MigrationOutcome::AlreadyExists
                }
                ErrorKind::RateLimited if retry < self.settings.retry.max_retries => {
                    let cooldown = self.settings.retry.delay_for(retry);
                    warn!(
                        user_id,
                        retry = retry + 1,
                        max_retries = self.settings.retry.max_retries,
                        cooldown_ms = cooldown.as_millis() as u64,
                        "rate limited; waiting before retry"
                    );
                    return Step::Retry(cooldown);
                }
                ErrorKind::RateLimited => {
                    error!(user_id, attempts = retry + 1, "rate limit retries exhausted");
                    self.log
                        .append(LogEntry::UserCreationError {
                            user_id: user_id.to_string(),
                            status: err.status(),
                            error: json!({
                                "message": format!(
                                    "still rate limited after {} attempts",
                                    retry + 1
                                ),
                                "errors": err.detail(),
                            }),
                        })
                        .await;
                    MigrationOutcome::RateLimited
                }
                ErrorKind::Other => {
                    error!(user_id, error = %err, "error creating user");
                    self.log
                        .append(LogEntry::UserCreationError {
                            user_id: user_id.to_string(),
                            status: err.status(),
                            error: err.detail(),
                        })
                        .await;
                    MigrationOutcome::UnknownError
                }
            },
        };

        state.settle(user_id, outcome);
        let summary = state.summary();
        let done = summary.settled();
        if done % PROGRESS_EVERY == 0 || (state.remaining() == 0 && state.in_flight() == 0) {
            info!(
                done,
                total = summary.total,
                migrated = summary.migrated,
                already_exists = summary.already_exists,
                "migrating users"
            );
        }
        Step::Done
    }
}
