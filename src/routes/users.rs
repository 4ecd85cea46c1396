use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{password, AuthenticatedUser, ROLE_ADMIN, ROLE_USER};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User};
use crate::schema::users;
use crate::state::AppState;

use super::contracts::to_iso;

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: to_iso(user.created_at),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

fn validate_role(role: &str) -> AppResult<()> {
    if role == ROLE_ADMIN || role == ROLE_USER {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("unknown role '{role}'")))
    }
}

fn validate_new_password(raw: &str) -> AppResult<()> {
    if raw.len() < 8 {
        return Err(AppError::bad_request(
            "password must be at least 8 characters",
        ));
    }
    Ok(())
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<UserResponse>>> {
    user.require_admin()?;
    let mut conn = state.db()?;
    let rows: Vec<User> = users::table.order(users::created_at.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    user.require_admin()?;
    let mut conn = state.db()?;

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("email must be a valid address"));
    }
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    validate_new_password(&payload.password)?;
    let role = payload.role.unwrap_or_else(|| ROLE_USER.to_string());
    validate_role(&role)?;

    let exists: i64 = users::table
        .filter(users::email.eq(&email))
        .count()
        .get_result(&mut conn)?;
    if exists > 0 {
        return Err(AppError::bad_request(format!(
            "a user with email '{email}' already exists"
        )));
    }

    let new_user = NewUser {
        id: Uuid::new_v4(),
        email,
        password_hash: password::hash_password(&payload.password)?,
        name: name.to_string(),
        role,
    };
    diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)?;

    let created: User = users::table.find(new_user.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    user.require_admin()?;
    let mut conn = state.db()?;
    let _existing: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let name = match payload.name {
        Some(ref raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("name must not be empty"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };
    if let Some(ref role) = payload.role {
        validate_role(role)?;
        // An admin dropping their own role would lock the last door.
        if user_id == user.user_id && role != ROLE_ADMIN {
            return Err(AppError::bad_request("cannot change your own role"));
        }
    }
    let password_hash = match payload.password {
        Some(ref raw) => {
            validate_new_password(raw)?;
            Some(password::hash_password(raw)?)
        }
        None => None,
    };

    #[derive(AsChangeset)]
    #[diesel(table_name = users)]
    struct UserChangeset {
        name: Option<String>,
        role: Option<String>,
        password_hash: Option<String>,
    }

    let changeset = UserChangeset {
        name,
        role: payload.role,
        password_hash,
    };
    if changeset.name.is_some() || changeset.role.is_some() || changeset.password_hash.is_some() {
        diesel::update(users::table.find(user_id))
            .set(&changeset)
            .execute(&mut conn)?;
    }

    let updated: User = users::table.find(user_id).first(&mut conn)?;
    Ok(Json(UserResponse::from(updated)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    if user_id == user.user_id {
        return Err(AppError::bad_request("cannot delete your own account"));
    }

    let mut conn = state.db()?;
    let deleted = diesel::delete(users::table.find(user_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    diesel::update(users::table.find(user.user_id))
        .set(users::name.eq(name))
        .execute(&mut conn)?;

    let updated: User = users::table.find(user.user_id).first(&mut conn)?;
    Ok(Json(UserResponse::from(updated)))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let current: User = users::table.find(user.user_id).first(&mut conn)?;

    let valid = password::verify_password(&payload.current_password, &current.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::bad_request("current password is incorrect"));
    }
    validate_new_password(&payload.new_password)?;

    diesel::update(users::table.find(user.user_id))
        .set(users::password_hash.eq(password::hash_password(&payload.new_password)?))
        .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}
