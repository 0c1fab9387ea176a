use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::users::loader::load_rows;
use crate::users::validator::validate;
use crate::users::{SourcePlatform, UserRecord};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConvertSummary {
    pub written: usize,
    pub rejected: usize,
}

/// Turn an export file into a canonical JSON user array at `out`.
/// Rows that fail validation are reported and left out.
pub fn convert_file(
    input: &Path,
    out: &Path,
    source: SourcePlatform,
) -> anyhow::Result<ConvertSummary> {
    let rows = load_rows(input)?;
    let mut records: Vec<UserRecord> = Vec::with_capacity(rows.len());
    let mut rejected = 0;
    for (row, raw) in rows.iter().enumerate() {
        match validate(raw, source) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(row, path = e.path(), error = %e, "row skipped");
                rejected += 1;
            }
        }
    }

    let json = serde_json::to_string_pretty(&records).context("serialize users")?;
    std::fs::write(out, json).with_context(|| format!("write {}", out.display()))?;
    info!(
        input = %input.display(),
        out = %out.display(),
        written = records.len(),
        rejected,
        "export converted"
    );
    Ok(ConvertSummary {
        written: records.len(),
        rejected,
    })
}
