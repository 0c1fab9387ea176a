pub mod backoff;
pub mod driver;
pub mod log;
pub mod state;

use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn};

use crate::migrate::backoff::{BackoffKind, RetryPolicy};
use crate::migrate::driver::{DriverSettings, Migrator};
use crate::migrate::log::{LogEntry, OutcomeLog};
use crate::migrate::state::{RunState, RunSummary};
use crate::state::AppState;
use crate::users::loader::load_rows;
use crate::users::validator::{validate, RawRow};
use crate::users::{PendingRecord, SourcePlatform};

/// What to import and how.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub file: PathBuf,
    pub source: SourcePlatform,
    pub offset: usize,
    pub concurrency: Option<usize>,
    pub backoff: Option<BackoffKind>,
}

/// Validate raw rows from `offset` on. Rejections are written to the log and
/// counted; they never reach the driver.
pub async fn prepare(
    rows: Vec<RawRow>,
    source: SourcePlatform,
    offset: usize,
    log: &OutcomeLog,
) -> RunState {
    let mut accepted = Vec::with_capacity(rows.len().saturating_sub(offset));
    let mut rejected = 0usize;
    for (row, raw) in rows.into_iter().enumerate().skip(offset) {
        match validate(&raw, source) {
            Ok(record) => accepted.push(PendingRecord { row, record }),
            Err(e) => {
                warn!(row, path = e.path(), error = %e, "row failed validation");
                log.append(LogEntry::ValidationError {
                    row,
                    error: e.to_string(),
                    path: e.path().to_string(),
                })
                .await;
                rejected += 1;
            }
        }
    }

    let mut state = RunState::new(accepted);
    for _ in 0..rejected {
        state.record_validation_failure();
    }
    state
}

/// Driver settings for a plan. Concurrent runs default to exponential
/// backoff, sequential runs to a fixed cooldown.
pub fn driver_settings(app: &AppState, plan: &ImportPlan) -> DriverSettings {
    let cfg = &app.config.migration;
    let kind = plan
        .backoff
        .or(cfg.backoff)
        .unwrap_or(match plan.concurrency {
            Some(_) => BackoffKind::Exponential,
            None => BackoffKind::Fixed,
        });
    DriverSettings {
        delay: cfg.delay,
        retry: RetryPolicy {
            kind,
            base: cfg.retry_delay,
            max_retries: cfg.max_retries,
        },
        concurrency: plan.concurrency,
    }
}

/// Load, validate and migrate one user file.
pub async fn run_import(app: &AppState, plan: &ImportPlan) -> anyhow::Result<RunSummary> {
    let rows = load_rows(&plan.file)
        .with_context(|| format!("load users from {}", plan.file.display()))?;
    info!(
        file = %plan.file.display(),
        source = %plan.source,
        rows = rows.len(),
        offset = plan.offset,
        "users loaded"
    );

    let state = prepare(rows, plan.source, plan.offset, &app.log).await;
    let settings = driver_settings(app, plan);
    info!(
        records = state.remaining(),
        concurrency = ?settings.concurrency,
        backoff = %settings.retry.kind,
        "migration started"
    );

    let summary = Migrator::new(app.api.clone(), app.log.clone(), settings)
        .run(state)
        .await;
    info!(
        migrated = summary.migrated,
        already_exists = summary.already_exists,
        failed = summary.logged_failures(),
        "migration complete"
    );
    Ok(summary)
}
