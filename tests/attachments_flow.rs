mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{acquire_db_lock, body_to_json, body_to_vec, TestApp};
use serde_json::json;
use uuid::Uuid;

fn iso(offset_days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(offset_days)).to_string()
}

async fn create_contract(app: &TestApp, token: &str) -> Result<Uuid> {
    let response = app
        .post_json(
            "/api/contracts",
            &json!({
                "name": "With files",
                "partner": "Acme",
                "sign_date": iso(0),
                "expire_date": iso(90)
            }),
            Some(token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_to_json(response.into_body()).await?;
    Ok(serde_json::from_value(body["id"].clone())?)
}

#[tokio::test]
async fn attachment_upload_download_delete() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_user("files@example.com", "filepass", "Files", "admin")
        .await?;
    let token = app.login_token("files@example.com", "filepass").await?;
    let contract_id = create_contract(&app, &token).await?;

    let upload = app
        .upload_file(
            &format!("/api/contracts/{contract_id}/attachments"),
            "scan of contract.pdf",
            "application/pdf",
            b"%PDF-1.4 fake",
            &token,
        )
        .await?;
    assert_eq!(upload.status(), StatusCode::CREATED);
    let uploaded = body_to_json(upload.into_body()).await?;
    assert_eq!(uploaded["file_name"], "scan_of_contract.pdf");
    assert_eq!(uploaded["mime_type"], "application/pdf");
    assert_eq!(uploaded["size_bytes"], 13);
    let attachment_id = uploaded["id"].as_str().unwrap().to_string();
    assert_eq!(app.storage().file_count().await, 1);

    let listing = app
        .get(
            &format!("/api/contracts/{contract_id}/attachments"),
            Some(&token),
        )
        .await?;
    assert_eq!(listing.status(), StatusCode::OK);
    let listing = body_to_json(listing.into_body()).await?;
    assert_eq!(listing.as_array().unwrap().len(), 1);

    let download = app
        .get(
            &format!("/api/attachments/{attachment_id}/download"),
            Some(&token),
        )
        .await?;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(
        download
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok()),
        Some("application/pdf")
    );
    let disposition = download
        .headers()
        .get("content-disposition")
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment;"));
    let bytes = body_to_vec(download.into_body()).await?;
    assert_eq!(bytes, b"%PDF-1.4 fake");

    let delete = app
        .delete(&format!("/api/attachments/{attachment_id}"), Some(&token))
        .await?;
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.storage().file_count().await, 0);

    let gone = app
        .get(
            &format!("/api/attachments/{attachment_id}/download"),
            Some(&token),
        )
        .await?;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    app.cleanup().await
}

#[tokio::test]
async fn attachments_follow_their_contract() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_user("cascade@example.com", "cascadepass", "Cascade", "admin")
        .await?;
    let token = app.login_token("cascade@example.com", "cascadepass").await?;

    let missing = app
        .upload_file(
            &format!("/api/contracts/{}/attachments", Uuid::new_v4()),
            "orphan.txt",
            "text/plain",
            b"nobody home",
            &token,
        )
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let contract_id = create_contract(&app, &token).await?;
    let upload = app
        .upload_file(
            &format!("/api/contracts/{contract_id}/attachments"),
            "annex.txt",
            "text/plain",
            b"annex",
            &token,
        )
        .await?;
    assert_eq!(upload.status(), StatusCode::CREATED);
    assert_eq!(app.storage().file_count().await, 1);

    let delete = app
        .delete(&format!("/api/contracts/{contract_id}"), Some(&token))
        .await?;
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);

    // Contract deletion sweeps the stored files with it.
    assert_eq!(app.storage().file_count().await, 0);

    app.cleanup().await
}
