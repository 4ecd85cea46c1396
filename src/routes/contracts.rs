use std::collections::{BTreeMap, HashMap};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::audit::{self, display_summary, record_audit};
use crate::auth::AuthenticatedUser;
use crate::contracts::{
    create_details, delete_details, display_value, expiring_window, generate_change_details,
    month_label, month_window, parse_input_date, process_details, processed_label,
    validate_status, ContractPatch, LABEL_EXPIRE_DATE, LABEL_NAME, LABEL_PARTNER,
    LABEL_PROCESSED, LABEL_SIGN_DATE, LABEL_STATUS, STATUS_ACTIVE, STATUS_ARCHIVED,
};
use crate::error::{AppError, AppResult};
use crate::models::{Attachment, AuditLog, Contract, ContractField, NewContract, User};
use crate::schema::{attachments, audit_logs, contract_fields, contracts, users};
use crate::state::AppState;

use super::attachments::AttachmentSummary;

pub const SORT_FIELDS: &[&str] = &[
    "name",
    "partner",
    "sign_date",
    "expire_date",
    "status",
    "created_at",
];

pub fn to_iso(ts: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(ts, Utc).to_rfc3339()
}

#[derive(Deserialize)]
pub struct ContractListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub ids: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateContractRequest {
    pub name: String,
    pub partner: String,
    pub sign_date: String,
    pub expire_date: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub custom_data: Option<Value>,
}

#[derive(Deserialize)]
pub struct UpdateContractRequest {
    pub name: Option<String>,
    pub partner: Option<String>,
    pub sign_date: Option<String>,
    pub expire_date: Option<String>,
    pub status: Option<String>,
    pub custom_data: Option<Value>,
}

#[derive(Serialize)]
pub struct CreatedBy {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct ContractResponse {
    pub id: Uuid,
    pub name: String,
    pub partner: String,
    pub sign_date: String,
    pub expire_date: String,
    pub status: String,
    pub is_processed: bool,
    pub custom_data: Value,
    pub created_by: Option<CreatedBy>,
    pub attachments: Vec<AttachmentSummary>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct ContractListResponse {
    pub data: Vec<ContractResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Serialize)]
pub struct LogUser {
    pub id: Uuid,
    pub name: String,
}

#[derive(Serialize)]
pub struct ContractLogEntry {
    pub id: Uuid,
    pub action: String,
    pub summary: String,
    pub details: Value,
    pub user: Option<LogUser>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ContractDetailResponse {
    pub contract: ContractResponse,
    pub logs: Vec<ContractLogEntry>,
}

#[derive(Serialize)]
pub struct StatusBucket {
    pub label: String,
    pub value: i64,
}

#[derive(Serialize)]
pub struct TrendPoint {
    pub month: String,
    pub count: i64,
}

#[derive(Serialize)]
pub struct ContractStats {
    pub total: i64,
    pub active: i64,
    pub expiring: i64,
    pub expired: i64,
    pub processed: i64,
    pub status_distribution: Vec<StatusBucket>,
    pub expiry_trend: Vec<TrendPoint>,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub imported: usize,
}

type BoxedContractsQuery = contracts::BoxedQuery<'static, Pg>;

/// Shared filter builder; the derived buckets (`expiring`, `expired`,
/// `unprocessed`) are computed from `expire_date` and `is_processed`, every
/// other status value is matched verbatim.
fn filtered_contracts(
    status: Option<&str>,
    search: Option<&str>,
    today: NaiveDate,
    window_days: i64,
) -> BoxedContractsQuery {
    let mut query = contracts::table.into_boxed();

    match status {
        Some("expiring") => {
            let (from, to) = expiring_window(today, window_days);
            query = query
                .filter(contracts::status.eq(STATUS_ACTIVE))
                .filter(contracts::is_processed.eq(false))
                .filter(contracts::expire_date.ge(from))
                .filter(contracts::expire_date.le(to));
        }
        Some("expired") => {
            query = query
                .filter(contracts::status.eq(STATUS_ACTIVE))
                .filter(contracts::is_processed.eq(false))
                .filter(contracts::expire_date.lt(today));
        }
        Some("unprocessed") => {
            query = query
                .filter(contracts::is_processed.eq(false))
                .filter(contracts::expire_date.lt(today));
        }
        Some(other) => {
            query = query.filter(contracts::status.eq(other.to_string()));
        }
        None => {}
    }

    if let Some(term) = search {
        let pattern = format!("%{term}%");
        query = query.filter(
            contracts::name
                .ilike(pattern.clone())
                .or(contracts::partner.ilike(pattern)),
        );
    }

    query
}

fn apply_sort(
    query: BoxedContractsQuery,
    sort_field: Option<&str>,
    sort_order: Option<&str>,
) -> BoxedContractsQuery {
    let descending = matches!(sort_order, Some("desc"));
    let field = sort_field.filter(|candidate| SORT_FIELDS.contains(candidate));

    match (field, descending) {
        (Some("name"), false) => query.order(contracts::name.asc()),
        (Some("name"), true) => query.order(contracts::name.desc()),
        (Some("partner"), false) => query.order(contracts::partner.asc()),
        (Some("partner"), true) => query.order(contracts::partner.desc()),
        (Some("sign_date"), false) => query.order(contracts::sign_date.asc()),
        (Some("sign_date"), true) => query.order(contracts::sign_date.desc()),
        (Some("status"), false) => query.order(contracts::status.asc()),
        (Some("status"), true) => query.order(contracts::status.desc()),
        (Some("created_at"), false) => query.order(contracts::created_at.asc()),
        (Some("created_at"), true) => query.order(contracts::created_at.desc()),
        (Some("expire_date"), true) => query.order(contracts::expire_date.desc()),
        // Default sort, also used for unknown fields.
        _ => query.order(contracts::expire_date.asc()),
    }
}

fn normalize_filter(raw: Option<&String>) -> Option<String> {
    raw.map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

/// Attach creator and attachment associations to a page of contracts.
fn build_responses(
    conn: &mut PgConnection,
    rows: Vec<Contract>,
) -> AppResult<Vec<ContractResponse>> {
    let creator_ids: Vec<Uuid> = rows.iter().filter_map(|row| row.created_by).collect();
    let creators: Vec<User> = users::table
        .filter(users::id.eq_any(&creator_ids))
        .load(conn)?;
    let creator_map: HashMap<Uuid, User> =
        creators.into_iter().map(|user| (user.id, user)).collect();

    let contract_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let attachment_rows: Vec<Attachment> = attachments::table
        .filter(attachments::contract_id.eq_any(&contract_ids))
        .order(attachments::created_at.asc())
        .load(conn)?;
    let mut attachment_map: HashMap<Uuid, Vec<AttachmentSummary>> = HashMap::new();
    for attachment in attachment_rows {
        attachment_map
            .entry(attachment.contract_id)
            .or_default()
            .push(AttachmentSummary::from(attachment));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let created_by = row.created_by.and_then(|id| {
                creator_map.get(&id).map(|user| CreatedBy {
                    id: user.id,
                    name: user.name.clone(),
                    email: user.email.clone(),
                })
            });
            ContractResponse {
                id: row.id,
                name: row.name,
                partner: row.partner,
                sign_date: row.sign_date.to_string(),
                expire_date: row.expire_date.to_string(),
                status: row.status,
                is_processed: row.is_processed,
                custom_data: row.custom_data,
                created_by,
                attachments: attachment_map.remove(&row.id).unwrap_or_default(),
                created_at: to_iso(row.created_at),
                updated_at: to_iso(row.updated_at),
            }
        })
        .collect())
}

fn build_new_contract(
    payload: CreateContractRequest,
    actor: Option<Uuid>,
) -> AppResult<NewContract> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    let partner = payload.partner.trim();
    if partner.is_empty() {
        return Err(AppError::bad_request("partner must not be empty"));
    }
    let sign_date = parse_input_date(&payload.sign_date)
        .ok_or_else(|| AppError::bad_request("sign_date must be an ISO date (YYYY-MM-DD)"))?;
    let expire_date = parse_input_date(&payload.expire_date)
        .ok_or_else(|| AppError::bad_request("expire_date must be an ISO date (YYYY-MM-DD)"))?;
    let status = payload
        .status
        .unwrap_or_else(|| STATUS_ACTIVE.to_string());
    validate_status(&status)?;
    let custom_data = normalize_custom_data(payload.custom_data)?;

    Ok(NewContract {
        id: Uuid::new_v4(),
        name: name.to_string(),
        partner: partner.to_string(),
        sign_date,
        expire_date,
        status,
        custom_data,
        created_by: actor,
    })
}

fn normalize_custom_data(input: Option<Value>) -> AppResult<Value> {
    match input {
        None | Some(Value::Null) => Ok(Value::Object(Map::new())),
        Some(value @ Value::Object(_)) => Ok(value),
        Some(_) => Err(AppError::bad_request("custom_data must be an object")),
    }
}

pub async fn list_contracts(
    State(state): State<AppState>,
    Query(params): Query<ContractListQuery>,
) -> AppResult<Json<ContractListResponse>> {
    let mut conn = state.db()?;
    let today = Utc::now().date_naive();
    let window = state.config.expiry_window_days;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 200);
    let status = normalize_filter(params.status.as_ref());
    let search = normalize_filter(params.search.as_ref());

    let total: i64 = filtered_contracts(status.as_deref(), search.as_deref(), today, window)
        .count()
        .get_result(&mut conn)?;

    let rows: Vec<Contract> = apply_sort(
        filtered_contracts(status.as_deref(), search.as_deref(), today, window),
        params.sort_field.as_deref(),
        params.sort_order.as_deref(),
    )
    .offset((page - 1) * limit)
    .limit(limit)
    .load(&mut conn)?;

    let data = build_responses(&mut conn, rows)?;
    let total_pages = if total == 0 {
        0
    } else {
        (total + limit - 1) / limit
    };

    Ok(Json(ContractListResponse {
        data,
        total,
        page,
        limit,
        total_pages,
    }))
}

pub async fn create_contract(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateContractRequest>,
) -> AppResult<(StatusCode, Json<ContractResponse>)> {
    let mut conn = state.db()?;
    let new_contract = build_new_contract(payload, Some(user.user_id))?;

    // Row and audit entry land together or not at all.
    let created = conn.transaction::<Contract, AppError, _>(|conn| {
        diesel::insert_into(contracts::table)
            .values(&new_contract)
            .execute(conn)?;
        record_audit(
            conn,
            audit::ACTION_CREATE,
            Some(new_contract.id),
            Some(user.user_id),
            &create_details(&new_contract),
        )?;
        Ok(contracts::table.find(new_contract.id).first(conn)?)
    })?;

    let mut responses = build_responses(&mut conn, vec![created])?;
    Ok((StatusCode::CREATED, Json(responses.remove(0))))
}

pub async fn get_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
) -> AppResult<Json<ContractDetailResponse>> {
    let mut conn = state.db()?;
    let contract: Contract = contracts::table
        .find(contract_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let logs = load_contract_logs(&mut conn, contract_id)?;
    let mut responses = build_responses(&mut conn, vec![contract])?;

    Ok(Json(ContractDetailResponse {
        contract: responses.remove(0),
        logs,
    }))
}

fn load_contract_logs(
    conn: &mut PgConnection,
    contract_id: Uuid,
) -> AppResult<Vec<ContractLogEntry>> {
    let rows: Vec<AuditLog> = audit_logs::table
        .filter(audit_logs::contract_id.eq(contract_id))
        .order(audit_logs::created_at.desc())
        .load(conn)?;

    let user_ids: Vec<Uuid> = rows.iter().filter_map(|row| row.user_id).collect();
    let user_rows: Vec<User> = users::table.filter(users::id.eq_any(&user_ids)).load(conn)?;
    let user_map: HashMap<Uuid, User> = user_rows.into_iter().map(|u| (u.id, u)).collect();

    Ok(rows
        .into_iter()
        .map(|row| {
            let user = row.user_id.and_then(|id| {
                user_map.get(&id).map(|u| LogUser {
                    id: u.id,
                    name: u.name.clone(),
                })
            });
            ContractLogEntry {
                id: row.id,
                action: row.action,
                summary: display_summary(&row.details),
                details: row.details,
                user,
                created_at: to_iso(row.created_at),
            }
        })
        .collect())
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = contracts)]
struct ContractChangeset<'a> {
    name: Option<&'a str>,
    partner: Option<&'a str>,
    sign_date: Option<NaiveDate>,
    expire_date: Option<NaiveDate>,
    status: Option<&'a str>,
    custom_data: Option<&'a Value>,
}

fn build_patch(payload: &UpdateContractRequest) -> AppResult<ContractPatch> {
    let mut patch = ContractPatch::default();

    if let Some(ref name) = payload.name {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("name must not be empty"));
        }
        patch.name = Some(trimmed.to_string());
    }
    if let Some(ref partner) = payload.partner {
        let trimmed = partner.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("partner must not be empty"));
        }
        patch.partner = Some(trimmed.to_string());
    }
    if let Some(ref raw) = payload.sign_date {
        patch.sign_date = Some(parse_input_date(raw).ok_or_else(|| {
            AppError::bad_request("sign_date must be an ISO date (YYYY-MM-DD)")
        })?);
    }
    if let Some(ref raw) = payload.expire_date {
        patch.expire_date = Some(parse_input_date(raw).ok_or_else(|| {
            AppError::bad_request("expire_date must be an ISO date (YYYY-MM-DD)")
        })?);
    }
    if let Some(ref status) = payload.status {
        validate_status(status)?;
        patch.status = Some(status.clone());
    }
    if let Some(ref custom) = payload.custom_data {
        match custom {
            Value::Object(map) => patch.custom_data = Some(map.clone()),
            _ => return Err(AppError::bad_request("custom_data must be an object")),
        }
    }

    Ok(patch)
}

pub async fn update_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateContractRequest>,
) -> AppResult<Json<ContractResponse>> {
    let mut conn = state.db()?;
    let existing: Contract = contracts::table
        .find(contract_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let patch = build_patch(&payload)?;
    let details = generate_change_details(&existing, &patch);

    let updated = conn.transaction::<Contract, AppError, _>(|conn| {
        if !patch.is_empty() {
            let custom_value = patch.custom_data.clone().map(Value::Object);
            let changeset = ContractChangeset {
                name: patch.name.as_deref(),
                partner: patch.partner.as_deref(),
                sign_date: patch.sign_date,
                expire_date: patch.expire_date,
                status: patch.status.as_deref(),
                custom_data: custom_value.as_ref(),
            };
            let now = Utc::now().naive_utc();
            diesel::update(contracts::table.find(contract_id))
                .set((&changeset, contracts::updated_at.eq(now)))
                .execute(conn)?;
        }

        // An update call always leaves a trail entry, even when nothing
        // changed.
        record_audit(
            conn,
            audit::ACTION_UPDATE,
            Some(contract_id),
            Some(user.user_id),
            &details,
        )?;

        Ok(contracts::table.find(contract_id).first(conn)?)
    })?;
    let mut responses = build_responses(&mut conn, vec![updated])?;
    Ok(Json(responses.remove(0)))
}

pub async fn process_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<ContractResponse>> {
    let mut conn = state.db()?;
    let existing: Contract = contracts::table
        .find(contract_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let updated = conn.transaction::<Contract, AppError, _>(|conn| {
        let now = Utc::now().naive_utc();
        diesel::update(contracts::table.find(contract_id))
            .set((
                contracts::is_processed.eq(true),
                contracts::updated_at.eq(now),
            ))
            .execute(conn)?;

        record_audit(
            conn,
            audit::ACTION_PROCESS,
            Some(contract_id),
            Some(user.user_id),
            &process_details(&existing),
        )?;

        Ok(contracts::table.find(contract_id).first(conn)?)
    })?;
    let mut responses = build_responses(&mut conn, vec![updated])?;
    Ok(Json(responses.remove(0)))
}

pub async fn delete_contract(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    // The audit entry must not survive a failed delete, so snapshot, trail,
    // and removal commit as one unit. Attachment rows cascade with the
    // contract; the audit row keeps its details and has contract_id cleared
    // by the FK.
    let storage_keys = conn.transaction::<Vec<String>, AppError, _>(|conn| {
        let existing: Contract = contracts::table
            .find(contract_id)
            .first(conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;

        let keys: Vec<String> = attachments::table
            .filter(attachments::contract_id.eq(contract_id))
            .select(attachments::storage_key)
            .load(conn)?;

        record_audit(
            conn,
            audit::ACTION_DELETE,
            Some(contract_id),
            Some(user.user_id),
            &delete_details(&existing),
        )?;

        diesel::delete(contracts::table.find(contract_id)).execute(conn)?;
        Ok(keys)
    })?;

    for key in storage_keys {
        if let Err(err) = state.files.delete(&key).await {
            warn!(error = %err, %key, "failed to remove attachment file");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn expiring_contracts(
    State(state): State<AppState>,
    Query(params): Query<ExpiringQuery>,
) -> AppResult<Json<Vec<ContractResponse>>> {
    let mut conn = state.db()?;
    let today = Utc::now().date_naive();
    let days = params
        .days
        .unwrap_or(state.config.expiry_window_days)
        .max(0);
    let horizon = today + chrono::Duration::days(days);

    let rows: Vec<Contract> = contracts::table
        .filter(contracts::status.eq(STATUS_ACTIVE))
        .filter(contracts::is_processed.eq(false))
        .filter(contracts::expire_date.le(horizon))
        .order(contracts::expire_date.asc())
        .load(&mut conn)?;

    Ok(Json(build_responses(&mut conn, rows)?))
}

pub async fn unprocessed_contracts(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ContractResponse>>> {
    let mut conn = state.db()?;
    let today = Utc::now().date_naive();

    // Unlike the expired bucket this ignores status; an archived contract
    // that slipped past its expiry still needs processing.
    let rows: Vec<Contract> = contracts::table
        .filter(contracts::is_processed.eq(false))
        .filter(contracts::expire_date.lt(today))
        .order(contracts::expire_date.asc())
        .load(&mut conn)?;

    Ok(Json(build_responses(&mut conn, rows)?))
}

pub async fn contract_stats(State(state): State<AppState>) -> AppResult<Json<ContractStats>> {
    let mut conn = state.db()?;
    let today = Utc::now().date_naive();
    let (window_start, window_end) = expiring_window(today, state.config.expiry_window_days);

    let total: i64 = contracts::table.count().get_result(&mut conn)?;
    let active: i64 = contracts::table
        .filter(contracts::status.eq(STATUS_ACTIVE))
        .count()
        .get_result(&mut conn)?;
    let expiring: i64 = contracts::table
        .filter(contracts::status.eq(STATUS_ACTIVE))
        .filter(contracts::is_processed.eq(false))
        .filter(contracts::expire_date.ge(window_start))
        .filter(contracts::expire_date.le(window_end))
        .count()
        .get_result(&mut conn)?;
    let expired: i64 = contracts::table
        .filter(contracts::status.eq(STATUS_ACTIVE))
        .filter(contracts::is_processed.eq(false))
        .filter(contracts::expire_date.lt(today))
        .count()
        .get_result(&mut conn)?;
    let processed: i64 = contracts::table
        .filter(contracts::is_processed.eq(true))
        .count()
        .get_result(&mut conn)?;
    let archived: i64 = contracts::table
        .filter(contracts::status.eq(STATUS_ARCHIVED))
        .count()
        .get_result(&mut conn)?;

    let status_distribution = vec![
        StatusBucket {
            label: "Active".to_string(),
            value: active - expiring,
        },
        StatusBucket {
            label: "Expiring".to_string(),
            value: expiring,
        },
        StatusBucket {
            label: "Expired".to_string(),
            value: expired,
        },
        StatusBucket {
            label: "Archived".to_string(),
            value: archived,
        },
    ];

    let mut expiry_trend = Vec::with_capacity(6);
    for offset in 0..6 {
        let (month_start, month_end) = month_window(today, offset);
        let count: i64 = contracts::table
            .filter(contracts::expire_date.ge(month_start))
            .filter(contracts::expire_date.lt(month_end))
            .count()
            .get_result(&mut conn)?;
        expiry_trend.push(TrendPoint {
            month: month_label(month_start),
            count,
        });
    }

    Ok(Json(ContractStats {
        total,
        active,
        expiring,
        expired,
        processed,
        status_distribution,
        expiry_trend,
    }))
}

/// Rows keyed by human labels: the base columns plus every custom field's
/// label. The spreadsheet encoding itself lives outside this service.
pub async fn export_contracts(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> AppResult<Json<Vec<BTreeMap<String, String>>>> {
    let mut conn = state.db()?;

    let rows: Vec<Contract> = match parse_id_list(params.ids.as_deref())? {
        Some(ids) => contracts::table
            .filter(contracts::id.eq_any(&ids))
            .order(contracts::expire_date.asc())
            .load(&mut conn)?,
        None => contracts::table
            .order(contracts::expire_date.asc())
            .load(&mut conn)?,
    };

    let custom_fields: Vec<ContractField> = contract_fields::table
        .filter(contract_fields::is_system.eq(false))
        .order(contract_fields::display_order.asc())
        .load(&mut conn)?;

    let empty = Map::new();
    let export = rows
        .into_iter()
        .map(|contract| {
            let custom = contract.custom_data.as_object().unwrap_or(&empty).clone();
            let mut row = BTreeMap::new();
            row.insert(LABEL_NAME.to_string(), contract.name);
            row.insert(LABEL_PARTNER.to_string(), contract.partner);
            row.insert(LABEL_SIGN_DATE.to_string(), contract.sign_date.to_string());
            row.insert(
                LABEL_EXPIRE_DATE.to_string(),
                contract.expire_date.to_string(),
            );
            row.insert(
                LABEL_STATUS.to_string(),
                crate::contracts::status_label(&contract.status).to_string(),
            );
            row.insert(
                LABEL_PROCESSED.to_string(),
                processed_label(contract.is_processed).to_string(),
            );
            for field in &custom_fields {
                let value = custom
                    .get(&field.key)
                    .map(display_value)
                    .unwrap_or_default();
                row.insert(field.label.clone(), value);
            }
            row
        })
        .collect();

    Ok(Json(export))
}

fn parse_id_list(raw: Option<&str>) -> AppResult<Option<Vec<Uuid>>> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let ids = raw
        .split(',')
        .map(|part| {
            Uuid::parse_str(part.trim())
                .map_err(|_| AppError::bad_request(format!("invalid contract id '{part}'")))
        })
        .collect::<AppResult<Vec<Uuid>>>()?;
    Ok(Some(ids))
}

/// Import hands each row to the regular create path, so every imported
/// contract gets its own `create` audit entry. The batch is atomic: a bad
/// row rolls back every row before it.
pub async fn import_contracts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(rows): Json<Vec<CreateContractRequest>>,
) -> AppResult<Json<ImportResponse>> {
    let mut conn = state.db()?;

    let imported = conn.transaction::<usize, AppError, _>(|conn| {
        let mut imported = 0;
        for (index, row) in rows.into_iter().enumerate() {
            let new_contract = build_new_contract(row, Some(user.user_id)).map_err(|err| {
                AppError::bad_request(format!("row {}: {}", index + 1, err.message()))
            })?;

            diesel::insert_into(contracts::table)
                .values(&new_contract)
                .execute(conn)?;
            record_audit(
                conn,
                audit::ACTION_CREATE,
                Some(new_contract.id),
                Some(user.user_id),
                &create_details(&new_contract),
            )?;
            imported += 1;
        }
        Ok(imported)
    })?;

    Ok(Json(ImportResponse { imported }))
}
