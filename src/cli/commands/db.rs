use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{connect, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::{DatabaseManager, Stores};
use crate::services::reaper;

#[derive(Subcommand)]
pub enum DbCommands {
    #[command(about = "Create tables and indexes (idempotent)")]
    Init,

    #[command(about = "Delete expired token and OTP records")]
    Purge,
}

pub async fn handle(cmd: DbCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = connect(config).await?;

    match cmd {
        DbCommands::Init => {
            DatabaseManager::ensure_schema(&pool).await?;
            output_success(output_format, "Schema is up to date", None)
        }
        DbCommands::Purge => {
            let report = reaper::purge_expired(&Stores::postgres(pool)).await?;
            output_success(
                output_format,
                &format!("Purged {} token and {} OTP records", report.tokens, report.otps),
                Some(json!({ "tokens": report.tokens, "otps": report.otps })),
            )
        }
    }
}
