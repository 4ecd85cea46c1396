//! Daily expiry-reminder scan. The scan itself is a pure function over rows
//! loaded from the database; delivery goes through the [`Mailer`] seam so the
//! actual transport stays pluggable.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::contracts::STATUS_ACTIVE;
use crate::db::PgPool;
use crate::schema::{contracts, users};
use crate::settings;

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Records outgoing reminders in the log instead of delivering them; the
/// deployment wires in a real transport behind the same trait.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        info!(%to, %subject, "reminder email (transport not configured)");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DueContract {
    pub id: Uuid,
    pub name: String,
    pub partner: String,
    pub expire_date: NaiveDate,
    pub owner_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Expiring,
    Overdue,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub contract_id: Uuid,
    pub contract_name: String,
    pub recipient: Option<String>,
    pub days: i64,
    pub kind: NoticeKind,
}

/// One notice per contract whose remaining days fall inside any configured
/// threshold. A contract five days from expiry with thresholds [30, 7, 1]
/// yields a single notice, not one per matching threshold.
pub fn plan_expiry_notices(due: &[DueContract], reminder_days: &[i64], today: NaiveDate) -> Vec<Notice> {
    let max_threshold = reminder_days.iter().copied().max().unwrap_or(0);

    due.iter()
        .filter_map(|contract| {
            let days_left = (contract.expire_date - today).num_days();
            if days_left < 0 || days_left > max_threshold {
                return None;
            }
            Some(Notice {
                contract_id: contract.id,
                contract_name: contract.name.clone(),
                recipient: contract.owner_email.clone(),
                days: days_left,
                kind: NoticeKind::Expiring,
            })
        })
        .collect()
}

/// Overdue notices for contracts already past their expiry date.
pub fn plan_overdue_notices(due: &[DueContract], today: NaiveDate) -> Vec<Notice> {
    due.iter()
        .filter_map(|contract| {
            let days_over = (today - contract.expire_date).num_days();
            if days_over <= 0 {
                return None;
            }
            Some(Notice {
                contract_id: contract.id,
                contract_name: contract.name.clone(),
                recipient: contract.owner_email.clone(),
                days: days_over,
                kind: NoticeKind::Overdue,
            })
        })
        .collect()
}

/// Seconds until the next occurrence of `hour:00` UTC.
pub fn seconds_until_next_run(now: chrono::DateTime<Utc>, hour: u32) -> u64 {
    let mut next = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("hour is validated at config load");
    if next <= now.naive_utc() {
        next += chrono::Duration::days(1);
    }
    (Utc.from_utc_datetime(&next) - now).num_seconds().max(1) as u64
}

pub struct ReminderJob {
    pool: PgPool,
    config: Arc<AppConfig>,
    mailer: Arc<dyn Mailer>,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub expiring_notices: usize,
    pub overdue_notices: usize,
}

impl ReminderJob {
    pub fn new(pool: PgPool, config: Arc<AppConfig>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            pool,
            config,
            mailer,
        }
    }

    pub async fn run(&self) -> Result<()> {
        loop {
            match self.run_once().await {
                Ok(report) => info!(
                    expiring = report.expiring_notices,
                    overdue = report.overdue_notices,
                    "reminder scan finished"
                ),
                Err(err) => warn!(error = %err, "reminder scan failed"),
            }

            let wait = seconds_until_next_run(Utc::now(), self.config.reminder_hour_utc);
            info!(seconds = wait, "sleeping until next reminder scan");
            tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
        }
    }

    pub async fn run_once(&self) -> Result<ScanReport> {
        let mut conn = self.pool.get()?;
        let settings = settings::reminder_settings(&mut conn)
            .map_err(|err| anyhow::anyhow!("failed to load reminder settings: {err:?}"))?;
        let today = Utc::now().date_naive();

        let max_days = settings.reminder_days.iter().copied().max().unwrap_or(0);
        let horizon = today + chrono::Duration::days(max_days);

        let due = load_due_contracts(&mut conn, horizon)?;
        let mut report = ScanReport::default();

        for notice in plan_expiry_notices(&due, &settings.reminder_days, today) {
            info!(
                contract = %notice.contract_name,
                days_left = notice.days,
                "contract approaching expiry"
            );
            self.deliver(&settings, &notice).await;
            report.expiring_notices += 1;
        }

        if settings.repeat_reminder {
            for notice in plan_overdue_notices(&due, today) {
                warn!(
                    contract = %notice.contract_name,
                    days_overdue = notice.days,
                    "contract expired and unprocessed"
                );
                self.deliver(&settings, &notice).await;
                report.overdue_notices += 1;
            }
        }

        Ok(report)
    }

    async fn deliver(&self, settings: &settings::ReminderSettings, notice: &Notice) {
        if !settings.email_enabled {
            return;
        }
        let Some(recipient) = notice.recipient.as_deref() else {
            return;
        };

        let (subject, body) = match notice.kind {
            NoticeKind::Expiring => (
                format!(
                    "[Contract reminder] {} expires in {} days",
                    notice.contract_name, notice.days
                ),
                format!(
                    "Contract \"{}\" expires in {} days. Please review it.",
                    notice.contract_name, notice.days
                ),
            ),
            NoticeKind::Overdue => (
                format!(
                    "[Urgent] {} expired {} days ago",
                    notice.contract_name, notice.days
                ),
                format!(
                    "Contract \"{}\" expired {} days ago and has not been processed.",
                    notice.contract_name, notice.days
                ),
            ),
        };

        if let Err(err) = self.mailer.send(recipient, &subject, &body).await {
            warn!(error = %err, %recipient, "failed to send reminder email");
        }
    }
}

/// Active, unprocessed contracts expiring on or before `horizon`, with the
/// owning user's name and email when the owner still exists.
fn load_due_contracts(
    conn: &mut PgConnection,
    horizon: NaiveDate,
) -> Result<Vec<DueContract>> {
    let rows: Vec<(Uuid, String, String, NaiveDate, Option<(String, String)>)> = contracts::table
        .left_join(users::table)
        .filter(contracts::status.eq(STATUS_ACTIVE))
        .filter(contracts::is_processed.eq(false))
        .filter(contracts::expire_date.le(horizon))
        .order(contracts::expire_date.asc())
        .select((
            contracts::id,
            contracts::name,
            contracts::partner,
            contracts::expire_date,
            (users::name, users::email).nullable(),
        ))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(id, name, partner, expire_date, owner)| DueContract {
            id,
            name,
            partner,
            expire_date,
            owner_email: owner.map(|(_, email)| email),
        })
        .collect())
}
