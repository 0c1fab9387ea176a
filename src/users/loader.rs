use std::path::Path;

use anyhow::Context;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::users::validator::RawRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn detect(path: &Path) -> anyhow::Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("json") => Ok(FileFormat::Json),
            _ => anyhow::bail!(
                "unsupported file type for {} (expected .csv or .json)",
                path.display()
            ),
        }
    }
}

/// Read every row of a user export, in file order.
pub fn load_rows(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    anyhow::ensure!(path.exists(), "file not found: {}", path.display());
    let rows = match FileFormat::detect(path)? {
        FileFormat::Csv => read_csv(path)?,
        FileFormat::Json => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            parse_json(&text).with_context(|| format!("parse {}", path.display()))?
        }
    };
    debug!(path = %path.display(), rows = rows.len(), "user file loaded");
    Ok(rows)
}

fn read_csv(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let headers = reader.headers().context("read csv header")?.clone();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("read csv row {}", idx))?;
        if record.len() != headers.len() {
            warn!(
                row = idx,
                fields = record.len(),
                expected = headers.len(),
                "csv row length mismatch"
            );
        }
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

pub(crate) fn parse_json(text: &str) -> anyhow::Result<Vec<RawRow>> {
    let items: Vec<Value> = serde_json::from_str(text).context("expected a JSON array of users")?;
    Ok(items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => map,
            // non-objects fail validation as rows without fields
            _ => Map::new(),
        })
        .collect())
}

#[cfg(test)]
mod loader_tests {
    use super::*;
    use std::io::Write;

    fn temp_file(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(FileFormat::detect(Path::new("users.json")).unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::detect(Path::new("export.CSV")).unwrap(), FileFormat::Csv);
        assert!(FileFormat::detect(Path::new("users.xml")).is_err());
        assert!(FileFormat::detect(Path::new("users")).is_err());
    }

    #[test]
    fn loads_json_array_in_order() {
        let file = temp_file(
            ".json",
            r#"[{"userId":"1","email":"a@x.com"},{"userId":"2","email":"b@x.com"},42]"#,
        );
        let rows = load_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["userId"], "1");
        assert_eq!(rows[1]["email"], "b@x.com");
        assert!(rows[2].is_empty());
    }

    #[test]
    fn loads_csv_rows_as_strings() {
        let file = temp_file(
            ".csv",
            "id,first_name,primary_email_address,password_digest\n\
             user_1,John,john@example.com,\"$2a$12$abc,def\"\n\
             user_2,,jane@example.com,\n",
        );
        let rows = load_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["password_digest"], "$2a$12$abc,def");
        assert_eq!(rows[1]["first_name"], "");
        assert_eq!(rows[1]["primary_email_address"], "jane@example.com");
    }

    #[test]
    fn rejects_non_array_json() {
        let file = temp_file(".json", r#"{"userId":"1"}"#);
        assert!(load_rows(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_rows(Path::new("/definitely/not/here/users.json")).unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }
}
