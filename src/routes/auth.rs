use axum::{extract::State, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::User,
    schema::users::dsl,
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;

    let user: User = dsl::users
        .filter(dsl::email.eq(payload.email.trim()))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    let access_token = state.jwt.generate_token(&user).map_err(AppError::from)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiry_minutes * 60,
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
