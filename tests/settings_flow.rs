mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn settings_defaults_and_updates() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_user("cfg@example.com", "cfgpass1", "Config", "admin")
        .await?;
    let token = app.login_token("cfg@example.com", "cfgpass1").await?;

    let initial = app.get("/api/settings", Some(&token)).await?;
    assert_eq!(initial.status(), StatusCode::OK);
    let initial = body_to_json(initial.into_body()).await?;
    assert!(initial["smtp"].is_null());
    assert_eq!(initial["reminders"]["email_enabled"], false);
    assert_eq!(initial["reminders"]["reminder_days"], json!([30, 7, 1]));
    assert_eq!(initial["reminders"]["repeat_reminder"], true);

    let update_reminders = app
        .put_json(
            "/api/settings/reminders",
            &json!({
                "email_enabled": true,
                "reminder_days": [14, 3],
                "repeat_reminder": false,
                "repeat_interval_days": 2
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(update_reminders.status(), StatusCode::OK);

    let update_smtp = app
        .put_json(
            "/api/settings/smtp",
            &json!({
                "host": "smtp.example.com",
                "port": 587,
                "username": "mailer",
                "password": "mailpass",
                "from": "contracts@example.com"
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(update_smtp.status(), StatusCode::OK);

    let saved = app.get("/api/settings", Some(&token)).await?;
    let saved = body_to_json(saved.into_body()).await?;
    assert_eq!(saved["smtp"]["host"], "smtp.example.com");
    assert_eq!(saved["reminders"]["reminder_days"], json!([14, 3]));
    assert_eq!(saved["reminders"]["email_enabled"], true);

    let smtp_only = app.get("/api/settings/smtp", Some(&token)).await?;
    let smtp_only = body_to_json(smtp_only.into_body()).await?;
    assert_eq!(smtp_only["port"], 587);

    let reminders_only = app.get("/api/settings/reminders", Some(&token)).await?;
    let reminders_only = body_to_json(reminders_only.into_body()).await?;
    assert_eq!(reminders_only["repeat_interval_days"], 2);

    let bad_days = app
        .put_json(
            "/api/settings/reminders",
            &json!({
                "email_enabled": false,
                "reminder_days": [],
                "repeat_reminder": false,
                "repeat_interval_days": 1
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(bad_days.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await
}

#[tokio::test]
async fn settings_require_admin() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_user("viewer@example.com", "viewerpass", "Viewer", "user")
        .await?;
    let token = app.login_token("viewer@example.com", "viewerpass").await?;

    let read = app.get("/api/settings", Some(&token)).await?;
    assert_eq!(read.status(), StatusCode::FORBIDDEN);

    let write = app
        .put_json(
            "/api/settings/reminders",
            &json!({
                "email_enabled": true,
                "reminder_days": [7],
                "repeat_reminder": false,
                "repeat_interval_days": 1
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(write.status(), StatusCode::FORBIDDEN);

    app.cleanup().await
}
