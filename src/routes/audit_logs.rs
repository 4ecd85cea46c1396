use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::audit::display_summary;
use crate::contracts::parse_input_date;
use crate::error::{AppError, AppResult};
use crate::models::AuditLog;
use crate::schema::{audit_logs, contracts, users};
use crate::state::AppState;

use super::contracts::to_iso;

#[derive(Deserialize)]
pub struct AuditListQuery {
    pub action: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: String,
    pub summary: String,
    pub details: Value,
    pub contract_id: Option<Uuid>,
    pub contract_name: Option<String>,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct AuditListResponse {
    pub data: Vec<AuditEntry>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

type BoxedLogsQuery = audit_logs::BoxedQuery<'static, Pg>;

fn filtered_logs(
    action: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> BoxedLogsQuery {
    let mut query = audit_logs::table.into_boxed();
    if let Some(action) = action {
        query = query.filter(audit_logs::action.eq(action.to_string()));
    }
    if let Some(start) = start {
        query = query.filter(audit_logs::created_at.ge(start.and_time(chrono::NaiveTime::MIN)));
    }
    if let Some(end) = end {
        // The end date is inclusive; take everything before the next midnight.
        let next = end + chrono::Duration::days(1);
        query = query.filter(audit_logs::created_at.lt(next.and_time(chrono::NaiveTime::MIN)));
    }
    query
}

fn parse_date_param(raw: Option<&String>, name: &str) -> AppResult<Option<NaiveDate>> {
    match raw.map(|value| value.trim()).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => parse_input_date(value)
            .map(Some)
            .ok_or_else(|| AppError::bad_request(format!("{name} must be an ISO date (YYYY-MM-DD)"))),
    }
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(params): Query<AuditListQuery>,
) -> AppResult<Json<AuditListResponse>> {
    let mut conn = state.db()?;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let action = params
        .action
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let start = parse_date_param(params.start_date.as_ref(), "start_date")?;
    let end = parse_date_param(params.end_date.as_ref(), "end_date")?;

    let total: i64 = filtered_logs(action, start, end)
        .count()
        .get_result(&mut conn)?;

    let rows: Vec<AuditLog> = filtered_logs(action, start, end)
        .order(audit_logs::created_at.desc())
        .offset((page - 1) * limit)
        .limit(limit)
        .load(&mut conn)?;

    let user_ids: Vec<Uuid> = rows.iter().filter_map(|row| row.user_id).collect();
    let user_names: Vec<(Uuid, String)> = users::table
        .filter(users::id.eq_any(&user_ids))
        .select((users::id, users::name))
        .load(&mut conn)?;
    let user_map: HashMap<Uuid, String> = user_names.into_iter().collect();

    let contract_ids: Vec<Uuid> = rows.iter().filter_map(|row| row.contract_id).collect();
    let contract_names: Vec<(Uuid, String)> = contracts::table
        .filter(contracts::id.eq_any(&contract_ids))
        .select((contracts::id, contracts::name))
        .load(&mut conn)?;
    let contract_map: HashMap<Uuid, String> = contract_names.into_iter().collect();

    let data = rows
        .into_iter()
        .map(|row| AuditEntry {
            id: row.id,
            summary: display_summary(&row.details),
            action: row.action,
            contract_name: row
                .contract_id
                .and_then(|id| contract_map.get(&id).cloned()),
            contract_id: row.contract_id,
            user_name: row.user_id.and_then(|id| user_map.get(&id).cloned()),
            user_id: row.user_id,
            details: row.details,
            created_at: to_iso(row.created_at),
        })
        .collect();

    let total_pages = if total == 0 {
        0
    } else {
        (total + limit - 1) / limit
    };

    Ok(Json(AuditListResponse {
        data,
        total,
        page,
        limit,
        total_pages,
    }))
}
