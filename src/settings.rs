use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::NewSystemSetting;
use crate::schema::system_settings;

pub const KEY_SMTP: &str = "smtp";
pub const KEY_REMINDERS: &str = "reminders";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderSettings {
    pub email_enabled: bool,
    pub reminder_days: Vec<i64>,
    pub repeat_reminder: bool,
    pub repeat_interval_days: i64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            email_enabled: false,
            reminder_days: vec![30, 7, 1],
            repeat_reminder: true,
            repeat_interval_days: 1,
        }
    }
}

pub fn get_setting(conn: &mut PgConnection, key: &str) -> AppResult<Option<Value>> {
    let value = system_settings::table
        .find(key)
        .select(system_settings::value)
        .first::<Value>(conn)
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &mut PgConnection, key: &str, value: Value) -> AppResult<()> {
    let row = NewSystemSetting {
        key: key.to_string(),
        value,
    };
    diesel::insert_into(system_settings::table)
        .values(&row)
        .on_conflict(system_settings::key)
        .do_update()
        .set(system_settings::value.eq(&row.value))
        .execute(conn)?;
    Ok(())
}

/// SMTP is optional infrastructure; absence means "not configured yet" and is
/// not an error.
pub fn smtp_settings(conn: &mut PgConnection) -> AppResult<Option<SmtpSettings>> {
    match get_setting(conn, KEY_SMTP)? {
        Some(value) => {
            let parsed = serde_json::from_value(value)
                .map_err(|err| AppError::internal(format!("stored smtp settings invalid: {err}")))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Reminder settings fall back to defaults until someone saves them.
pub fn reminder_settings(conn: &mut PgConnection) -> AppResult<ReminderSettings> {
    match get_setting(conn, KEY_REMINDERS)? {
        Some(value) => serde_json::from_value(value)
            .map_err(|err| AppError::internal(format!("stored reminder settings invalid: {err}"))),
        None => Ok(ReminderSettings::default()),
    }
}
