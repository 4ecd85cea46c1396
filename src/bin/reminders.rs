use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use contrack::config::AppConfig;
use contrack::db;
use contrack::reminders::{LogMailer, ReminderJob};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(
        database_url = %config.redacted_database_url(),
        hour_utc = config.reminder_hour_utc,
        "starting reminder worker"
    );

    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let job = ReminderJob::new(pool, Arc::new(config), Arc::new(LogMailer));

    tokio::select! {
        result = job.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            Ok(())
        }
    }
}
