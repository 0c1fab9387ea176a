use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{macros::format_description, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{error, warn};

/// One structured line of the run log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum LogEntry {
    #[serde(rename = "User Creation Error", rename_all = "camelCase")]
    UserCreationError {
        user_id: String,
        status: Option<u16>,
        error: Value,
    },
    #[serde(rename = "User Already Exists", rename_all = "camelCase")]
    AlreadyExists {
        user_id: String,
        status: Option<u16>,
        error: Value,
    },
    #[serde(rename = "Validation Error")]
    ValidationError {
        row: usize,
        error: String,
        path: String,
    },
    #[serde(rename = "User Deletion Error", rename_all = "camelCase")]
    UserDeletionError {
        user_id: String,
        status: Option<u16>,
        error: Value,
    },
}

impl LogEntry {
    /// Conflicts are expected on reruns and go to their own file.
    fn is_informational(&self) -> bool {
        matches!(self, LogEntry::AlreadyExists { .. })
    }
}

/// Run-start timestamp used to key the log files, `YYYY-MM-DDTHH-MM-SS` (UTC).
pub fn run_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(format_description!(
        "[year]-[month]-[day]T[hour]-[minute]-[second]"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

struct SinkState {
    closed: bool,
    written: usize,
}

/// Append-or-merge JSON array log, one pair of files per run. Appends never
/// fail; write errors are reported through `tracing` and dropped.
#[derive(Clone)]
pub struct OutcomeLog {
    error_path: Arc<PathBuf>,
    info_path: Arc<PathBuf>,
    state: Arc<Mutex<SinkState>>,
}

impl OutcomeLog {
    pub fn new(dir: impl AsRef<Path>, stamp: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            error_path: Arc::new(dir.join(format!("{}.json", stamp))),
            info_path: Arc::new(dir.join(format!("{}-existing.json", stamp))),
            state: Arc::new(Mutex::new(SinkState {
                closed: false,
                written: 0,
            })),
        }
    }

    pub fn for_run(dir: impl AsRef<Path>) -> Self {
        Self::new(dir, &run_timestamp())
    }

    pub fn error_path(&self) -> &Path {
        &self.error_path
    }

    pub fn info_path(&self) -> &Path {
        &self.info_path
    }

    pub async fn append(&self, entry: LogEntry) {
        let mut state = self.state.lock().await;
        if state.closed {
            warn!(?entry, "outcome log already closed; entry dropped");
            return;
        }
        let path = if entry.is_informational() {
            self.info_path.as_path()
        } else {
            self.error_path.as_path()
        };
        match write_merged(path, &entry).await {
            Ok(()) => state.written += 1,
            Err(e) => error!(
                error = %e,
                path = %path.display(),
                "failed to write outcome log entry"
            ),
        }
    }

    /// Wait for any pending write and refuse further appends.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
    }

    pub async fn written(&self) -> usize {
        self.state.lock().await.written
    }
}

async fn read_existing(path: &Path) -> anyhow::Result<Vec<Value>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Ok(vec![other]),
        Err(e) => {
            let aside = path.with_extension("json.corrupt");
            warn!(
                error = %e,
                path = %path.display(),
                aside = %aside.display(),
                "unreadable log file moved aside"
            );
            tokio::fs::rename(path, &aside)
                .await
                .with_context(|| format!("move aside {}", path.display()))?;
            Ok(Vec::new())
        }
    }
}

async fn write_merged(path: &Path, entry: &LogEntry) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let mut entries = read_existing(path).await?;
    entries.push(serde_json::to_value(entry)?);

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(&entries)?)
        .await
        .with_context(|| format!("write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
