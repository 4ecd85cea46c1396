use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::settings::{
    reminder_settings, set_setting, smtp_settings, ReminderSettings, SmtpSettings, KEY_REMINDERS,
    KEY_SMTP,
};
use crate::state::AppState;

#[derive(Serialize)]
pub struct SettingsResponse {
    pub smtp: Option<SmtpSettings>,
    pub reminders: ReminderSettings,
}

pub async fn get_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<SettingsResponse>> {
    user.require_admin()?;
    let mut conn = state.db()?;
    Ok(Json(SettingsResponse {
        smtp: smtp_settings(&mut conn)?,
        reminders: reminder_settings(&mut conn)?,
    }))
}

pub async fn get_smtp_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Option<SmtpSettings>>> {
    user.require_admin()?;
    let mut conn = state.db()?;
    Ok(Json(smtp_settings(&mut conn)?))
}

pub async fn get_reminder_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ReminderSettings>> {
    user.require_admin()?;
    let mut conn = state.db()?;
    Ok(Json(reminder_settings(&mut conn)?))
}

pub async fn update_smtp_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<SmtpSettings>,
) -> AppResult<Json<SmtpSettings>> {
    user.require_admin()?;
    if payload.host.trim().is_empty() {
        return Err(AppError::bad_request("host must not be empty"));
    }
    if payload.port == 0 {
        return Err(AppError::bad_request("port must be positive"));
    }

    let mut conn = state.db()?;
    set_setting(&mut conn, KEY_SMTP, serde_json::to_value(&payload)?)?;
    Ok(Json(payload))
}

pub async fn update_reminder_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ReminderSettings>,
) -> AppResult<Json<ReminderSettings>> {
    user.require_admin()?;
    if payload.reminder_days.is_empty() {
        return Err(AppError::bad_request("reminder_days must not be empty"));
    }
    if payload.reminder_days.iter().any(|days| *days < 0) {
        return Err(AppError::bad_request("reminder_days must be non-negative"));
    }
    if payload.repeat_interval_days < 1 {
        return Err(AppError::bad_request(
            "repeat_interval_days must be at least 1",
        ));
    }

    let mut conn = state.db()?;
    set_setting(&mut conn, KEY_REMINDERS, serde_json::to_value(&payload)?)?;
    Ok(Json(payload))
}
