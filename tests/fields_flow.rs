mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct FieldInfo {
    id: Uuid,
    key: String,
    label: String,
    field_type: String,
    is_system: bool,
    is_visible: bool,
    display_order: i32,
}

async fn list_fields(app: &TestApp, token: &str) -> Result<Vec<FieldInfo>> {
    let response = app.get("/api/fields", Some(token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(serde_json::from_slice(
        &body_to_vec(response.into_body()).await?,
    )?)
}

#[tokio::test]
async fn system_fields_are_seeded_in_order() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_user("fields@example.com", "fieldpass", "Fields", "admin")
        .await?;
    let token = app.login_token("fields@example.com", "fieldpass").await?;

    let fields = list_fields(&app, &token).await?;
    assert_eq!(fields.len(), 6);
    assert!(fields.iter().all(|field| field.is_system));
    assert!(fields.iter().all(|field| field.is_visible));

    let keys: Vec<&str> = fields.iter().map(|field| field.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["name", "partner", "signDate", "expireDate", "status", "createdBy"]
    );
    let orders: Vec<i32> = fields.iter().map(|field| field.display_order).collect();
    assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);

    // Seeding again must not duplicate anything.
    let pool = app.state.pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().expect("connection for reseed");
        contrack::contracts::init_system_fields(&mut conn)
    })
    .await??;
    assert_eq!(list_fields(&app, &token).await?.len(), 6);

    app.cleanup().await
}

#[tokio::test]
async fn custom_field_lifecycle() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_user("custom@example.com", "custompass", "Custom", "admin")
        .await?;
    let token = app.login_token("custom@example.com", "custompass").await?;

    let create = app
        .post_json(
            "/api/fields",
            &json!({"key": "department", "label": "Department", "field_type": "text"}),
            Some(&token),
        )
        .await?;
    assert_eq!(create.status(), StatusCode::CREATED);
    let created: FieldInfo = serde_json::from_slice(&body_to_vec(create.into_body()).await?)?;
    assert!(!created.is_system);
    assert_eq!(created.display_order, 7);

    let duplicate = app
        .post_json(
            "/api/fields",
            &json!({"key": "department", "label": "Other", "field_type": "text"}),
            Some(&token),
        )
        .await?;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);

    let bad_type = app
        .post_json(
            "/api/fields",
            &json!({"key": "age", "label": "Age", "field_type": "integer"}),
            Some(&token),
        )
        .await?;
    assert_eq!(bad_type.status(), StatusCode::BAD_REQUEST);

    let update = app
        .patch_json(
            &format!("/api/fields/{}", created.id),
            &json!({"label": "Owning Department", "is_visible": false}),
            Some(&token),
        )
        .await?;
    assert_eq!(update.status(), StatusCode::OK);
    let updated: FieldInfo = serde_json::from_slice(&body_to_vec(update.into_body()).await?)?;
    assert_eq!(updated.label, "Owning Department");
    assert!(!updated.is_visible);
    assert_eq!(updated.field_type, "text");

    let delete = app
        .delete(&format!("/api/fields/{}", created.id), Some(&token))
        .await?;
    assert_eq!(delete.status(), StatusCode::NO_CONTENT);
    assert_eq!(list_fields(&app, &token).await?.len(), 6);

    app.cleanup().await
}

#[tokio::test]
async fn system_fields_resist_mutation() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    app.insert_user("guard@example.com", "guardpass", "Guard", "admin")
        .await?;
    let token = app.login_token("guard@example.com", "guardpass").await?;

    let fields = list_fields(&app, &token).await?;
    let status_field = fields
        .iter()
        .find(|field| field.key == "status")
        .expect("status field seeded");

    // Only the label of a system field may change.
    let relabel = app
        .patch_json(
            &format!("/api/fields/{}", status_field.id),
            &json!({"label": "Lifecycle"}),
            Some(&token),
        )
        .await?;
    assert_eq!(relabel.status(), StatusCode::OK);

    let retype = app
        .patch_json(
            &format!("/api/fields/{}", status_field.id),
            &json!({"field_type": "number"}),
            Some(&token),
        )
        .await?;
    assert_eq!(retype.status(), StatusCode::BAD_REQUEST);

    let hide = app
        .patch_json(
            &format!("/api/fields/{}", status_field.id),
            &json!({"is_visible": false}),
            Some(&token),
        )
        .await?;
    assert_eq!(hide.status(), StatusCode::BAD_REQUEST);

    let delete = app
        .delete(&format!("/api/fields/{}", status_field.id), Some(&token))
        .await?;
    assert_eq!(delete.status(), StatusCode::BAD_REQUEST);
    assert_eq!(list_fields(&app, &token).await?.len(), 6);

    app.cleanup().await
}
