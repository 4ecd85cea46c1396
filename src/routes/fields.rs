use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contracts::{validate_field_type, DomainError};
use crate::error::{AppError, AppResult};
use crate::models::{ContractField, NewContractField};
use crate::schema::contract_fields;
use crate::state::AppState;

use super::contracts::to_iso;

#[derive(Serialize)]
pub struct FieldResponse {
    pub id: Uuid,
    pub key: String,
    pub label: String,
    pub field_type: String,
    pub is_system: bool,
    pub is_visible: bool,
    pub display_order: i32,
    pub created_at: String,
}

impl From<ContractField> for FieldResponse {
    fn from(field: ContractField) -> Self {
        Self {
            id: field.id,
            key: field.key,
            label: field.label,
            field_type: field.field_type,
            is_system: field.is_system,
            is_visible: field.is_visible,
            display_order: field.display_order,
            created_at: to_iso(field.created_at),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateFieldRequest {
    pub key: String,
    pub label: String,
    pub field_type: String,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UpdateFieldRequest {
    pub label: Option<String>,
    pub field_type: Option<String>,
    pub is_visible: Option<bool>,
}

pub async fn list_fields(State(state): State<AppState>) -> AppResult<Json<Vec<FieldResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<ContractField> = contract_fields::table
        .order(contract_fields::display_order.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(FieldResponse::from).collect()))
}

pub async fn create_field(
    State(state): State<AppState>,
    Json(payload): Json<CreateFieldRequest>,
) -> AppResult<(StatusCode, Json<FieldResponse>)> {
    let mut conn = state.db()?;

    let key = payload.key.trim();
    if key.is_empty() {
        return Err(AppError::bad_request("key must not be empty"));
    }
    let label = payload.label.trim();
    if label.is_empty() {
        return Err(AppError::bad_request("label must not be empty"));
    }
    validate_field_type(&payload.field_type)?;

    // New fields land at the end of the display order.
    let max_order: Option<i32> = contract_fields::table
        .select(diesel::dsl::max(contract_fields::display_order))
        .first(&mut conn)?;

    let new_field = NewContractField {
        id: Uuid::new_v4(),
        key: key.to_string(),
        label: label.to_string(),
        field_type: payload.field_type,
        is_system: false,
        is_visible: payload.is_visible,
        display_order: max_order.unwrap_or(0) + 1,
    };

    diesel::insert_into(contract_fields::table)
        .values(&new_field)
        .execute(&mut conn)
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                AppError::bad_request(format!("field key '{key}' already exists"))
            }
            other => AppError::from(other),
        })?;

    let created: ContractField = contract_fields::table.find(new_field.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(FieldResponse::from(created))))
}

pub async fn update_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Json(payload): Json<UpdateFieldRequest>,
) -> AppResult<Json<FieldResponse>> {
    let mut conn = state.db()?;
    let existing: ContractField = contract_fields::table
        .find(field_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    // System fields are part of the base schema; only their label may change.
    if existing.is_system && (payload.field_type.is_some() || payload.is_visible.is_some()) {
        return Err(DomainError::SystemFieldImmutable.into());
    }

    let label = match payload.label {
        Some(ref raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("label must not be empty"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };
    if let Some(ref field_type) = payload.field_type {
        validate_field_type(field_type)?;
    }

    #[derive(AsChangeset)]
    #[diesel(table_name = contract_fields)]
    struct FieldChangeset {
        label: Option<String>,
        field_type: Option<String>,
        is_visible: Option<bool>,
    }

    let changeset = FieldChangeset {
        label,
        field_type: payload.field_type,
        is_visible: payload.is_visible,
    };
    if changeset.label.is_some() || changeset.field_type.is_some() || changeset.is_visible.is_some()
    {
        diesel::update(contract_fields::table.find(field_id))
            .set(&changeset)
            .execute(&mut conn)?;
    }

    let updated: ContractField = contract_fields::table.find(field_id).first(&mut conn)?;
    Ok(Json(FieldResponse::from(updated)))
}

pub async fn delete_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let existing: ContractField = contract_fields::table
        .find(field_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if existing.is_system {
        return Err(DomainError::SystemFieldUndeletable.into());
    }

    diesel::delete(contract_fields::table.find(field_id)).execute(&mut conn)?;
    Ok(StatusCode::NO_CONTENT)
}
