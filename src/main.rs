mod cli;
mod config;
mod convert;
mod delete;
mod migrate;
mod prompt;
mod remote;
mod shutdown;
mod state;
mod users;

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Command, ImportArgs};
use crate::config::AppConfig;
use crate::migrate::ImportPlan;
use crate::shutdown::{run_until_interrupted, INTERRUPTED_EXIT};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "user_migrator=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match Cli::parse().command() {
        Command::Convert { csv, out, source } => {
            let summary = convert::convert_file(&csv, &out, source)?;
            println!(
                "{} users written to {}, {} rows skipped",
                summary.written,
                out.display(),
                summary.rejected
            );
            Ok(())
        }
        Command::Import(args) => import(args).await,
        Command::Delete => delete().await,
    }
}

async fn import(mut args: ImportArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env()?;

    if args.interactive {
        let mut terminal = prompt::Terminal::new()?;
        match prompt::collect(&mut terminal, &args, config.migration.offset)? {
            Some(answers) => {
                config.migration.import_to_dev |= answers.import_to_dev;
                args = answers.args;
            }
            None => {
                println!("Migration cancelled");
                return Ok(());
            }
        }
    }
    config.check_target()?;

    let plan = ImportPlan {
        file: args.file.clone(),
        source: args.source,
        offset: args.offset.unwrap_or(config.migration.offset),
        concurrency: args.concurrency_limit(config.migration.concurrency_limit),
        backoff: args.backoff,
    };
    let app = AppState::init(config)?;

    let run = migrate::run_import(&app, &plan);
    let Some(res) = run_until_interrupted(run, tokio::signal::ctrl_c(), &app.log).await else {
        interrupted(&app);
    };
    let summary = res?;

    println!("{}", summary);
    report_logs(&app).await;
    Ok(())
}

async fn delete() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.check_target()?;
    let app = AppState::init(config)?;

    let run = delete::delete_all(&app);
    let Some(res) = run_until_interrupted(run, tokio::signal::ctrl_c(), &app.log).await else {
        interrupted(&app);
    };
    let summary = res?;

    println!("{}", summary);
    report_logs(&app).await;
    Ok(())
}

fn interrupted(app: &AppState) -> ! {
    eprintln!("Interrupted. Outcomes so far are in {}", app.log.error_path().display());
    std::process::exit(INTERRUPTED_EXIT);
}

async fn report_logs(app: &AppState) {
    if app.log.written().await > 0 {
        info!(
            errors = %app.log.error_path().display(),
            existing = %app.log.info_path().display(),
            "outcome log written"
        );
        println!(
            "Details in {} and {}",
            app.log.error_path().display(),
            app.log.info_path().display()
        );
    }
}
