use std::collections::BTreeMap;

use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::NewAuditLog;
use crate::schema::audit_logs;

pub const ACTION_CREATE: &str = "create";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_PROCESS: &str = "process";
pub const ACTION_DELETE: &str = "delete";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub from: String,
    pub to: String,
}

/// Details payload for `create` entries: initial values under human labels.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDetails {
    pub summary: String,
    pub fields: BTreeMap<String, String>,
}

/// Details payload for `update` and `process` entries.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDetails {
    pub summary: String,
    pub changes: Vec<FieldChange>,
    pub contract_name: String,
}

/// Details payload for `delete` entries: a pre-deletion snapshot.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDetails {
    pub summary: String,
    pub deleted_contract: BTreeMap<String, String>,
}

pub fn record_audit(
    conn: &mut PgConnection,
    action: &str,
    contract_id: Option<Uuid>,
    user_id: Option<Uuid>,
    details: &impl Serialize,
) -> AppResult<()> {
    let entry = NewAuditLog {
        id: Uuid::new_v4(),
        contract_id,
        user_id,
        action: action.to_string(),
        details: serde_json::to_value(details)?,
    };

    diesel::insert_into(audit_logs::table)
        .values(&entry)
        .execute(conn)?;
    Ok(())
}

/// The `details` schema evolved informally over time: early rows hold a plain
/// string, a later revision a bare `{action}` object, current rows the
/// structured shapes above. Readers fall back to raw text instead of failing.
pub fn display_summary(details: &Value) -> String {
    match details {
        Value::String(text) => text.clone(),
        Value::Object(map) => {
            if let Some(Value::String(summary)) = map.get("summary") {
                summary.clone()
            } else if let Some(Value::String(action)) = map.get("action") {
                action.clone()
            } else {
                details.to_string()
            }
        }
        other => other.to_string(),
    }
}
