use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::migrate::backoff::BackoffKind;
use crate::users::SourcePlatform;

pub const DEFAULT_USERS_FILE: &str = "users.json";

/// Bulk-import users from another auth provider's export.
#[derive(Debug, Parser)]
#[command(name = "user-migrator", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create every user of an export file in the target instance
    Import(ImportArgs),
    /// Delete every user of the target instance
    Delete,
    /// Convert a CSV export into a canonical JSON user file
    Convert {
        /// CSV export to read
        csv: PathBuf,
        /// JSON file to write
        #[arg(default_value = DEFAULT_USERS_FILE)]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = SourcePlatform::Clerk)]
        source: SourcePlatform,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ImportArgs {
    /// User export (.json or .csv)
    #[arg(default_value = DEFAULT_USERS_FILE)]
    pub file: PathBuf,

    /// Platform the export comes from
    #[arg(long, value_enum, default_value_t = SourcePlatform::Clerk)]
    pub source: SourcePlatform,

    /// Skip this many leading rows (overrides OFFSET)
    #[arg(long)]
    pub offset: Option<usize>,

    /// Create users concurrently, up to CONCURRENCY_LIMIT at once
    #[arg(long)]
    pub concurrent: bool,

    /// Concurrent mode with an explicit limit
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Cooldown schedule for rate-limited calls
    #[arg(long, value_enum)]
    pub backoff: Option<BackoffKind>,

    /// Ask for source, file, target and offset before starting
    #[arg(long, short)]
    pub interactive: bool,
}

impl Default for ImportArgs {
    fn default() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_USERS_FILE),
            source: SourcePlatform::Clerk,
            offset: None,
            concurrent: false,
            concurrency: None,
            backoff: None,
            interactive: false,
        }
    }
}

impl ImportArgs {
    /// Concurrency limit, if concurrent mode was requested.
    pub fn concurrency_limit(&self, configured: usize) -> Option<usize> {
        match (self.concurrency, self.concurrent) {
            (Some(n), _) => Some(n as usize),
            (None, true) => Some(configured),
            (None, false) => None,
        }
    }
}

impl Cli {
    /// The subcommand to run; a bare invocation imports `users.json`.
    pub fn command(self) -> Command {
        self.command
            .unwrap_or_else(|| Command::Import(ImportArgs::default()))
    }
}
