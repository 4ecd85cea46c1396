use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Json;
use diesel::prelude::*;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Attachment, Contract, NewAttachment};
use crate::schema::{attachments, contracts};
use crate::state::AppState;

use super::contracts::to_iso;

#[derive(Serialize)]
pub struct AttachmentSummary {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: String,
}

impl From<Attachment> for AttachmentSummary {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id,
            contract_id: attachment.contract_id,
            file_name: attachment.file_name,
            mime_type: attachment.mime_type,
            size_bytes: attachment.size_bytes,
            created_at: to_iso(attachment.created_at),
        }
    }
}

pub async fn list_attachments(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
) -> AppResult<Json<Vec<AttachmentSummary>>> {
    let mut conn = state.db()?;
    let _contract: Contract = contracts::table
        .find(contract_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let rows: Vec<Attachment> = attachments::table
        .filter(attachments::contract_id.eq(contract_id))
        .order(attachments::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(AttachmentSummary::from).collect()))
}

pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<AttachmentSummary>)> {
    let mut conn = state.db()?;
    let _contract: Contract = contracts::table
        .find(contract_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let mut stored: Option<NewAttachment> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::bad_request("file part must carry a filename"))?;
        let declared_mime = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(err.to_string()))?;

        let mime_type = declared_mime.unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        let id = Uuid::new_v4();
        let storage_key = format!("{contract_id}/{id}-{file_name}");
        let size_bytes = bytes.len() as i64;
        state.files.put(&storage_key, bytes.to_vec()).await?;

        stored = Some(NewAttachment {
            id,
            contract_id,
            file_name,
            storage_key,
            mime_type,
            size_bytes,
        });
        break;
    }

    let new_attachment = stored.ok_or_else(|| AppError::bad_request("missing 'file' part"))?;
    diesel::insert_into(attachments::table)
        .values(&new_attachment)
        .execute(&mut conn)?;

    let created: Attachment = attachments::table.find(new_attachment.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(AttachmentSummary::from(created))))
}

pub async fn download_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
) -> AppResult<Response> {
    let mut conn = state.db()?;
    let attachment: Attachment = attachments::table
        .find(attachment_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let bytes = state.files.get(&attachment.storage_key).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        attachment
            .mime_type
            .parse::<HeaderValue>()
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    let encoded_name = utf8_percent_encode(&attachment.file_name, NON_ALPHANUMERIC);
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename*=UTF-8''{encoded_name}")
            .parse::<HeaderValue>()
            .map_err(AppError::internal)?,
    );

    let mut response = Response::new(Body::from(bytes));
    *response.headers_mut() = headers;
    Ok(response)
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let attachment: Attachment = attachments::table
        .find(attachment_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    diesel::delete(attachments::table.find(attachment_id)).execute(&mut conn)?;

    // The row is gone either way; a stale file only wastes disk.
    if let Err(err) = state.files.delete(&attachment.storage_key).await {
        warn!(error = %err, key = %attachment.storage_key, "failed to remove attachment file");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Keep the original name readable but safe to embed in a storage key.
fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}
