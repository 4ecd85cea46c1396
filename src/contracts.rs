//! Contract domain rules: status vocabulary, human field labels, the
//! audit-diff generator, and the seeded field schema. Everything here is
//! synchronous and database-free except [`init_system_fields`].

use std::collections::BTreeSet;

use chrono::{Datelike, Months, NaiveDate};
use diesel::prelude::*;
use diesel::PgConnection;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::{ChangeDetails, CreateDetails, DeleteDetails, FieldChange};
use crate::models::{Contract, NewContract, NewContractField};
use crate::schema::contract_fields;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_ARCHIVED: &str = "archived";
pub const STATUS_VOID: &str = "void";
pub const CONTRACT_STATUSES: &[&str] = &[STATUS_ACTIVE, STATUS_ARCHIVED, STATUS_VOID];

pub const FIELD_TYPE_TEXT: &str = "text";
pub const FIELD_TYPE_NUMBER: &str = "number";
pub const FIELD_TYPE_DATE: &str = "date";
pub const FIELD_TYPES: &[&str] = &[FIELD_TYPE_TEXT, FIELD_TYPE_NUMBER, FIELD_TYPE_DATE];

pub const DEFAULT_EXPIRY_WINDOW_DAYS: i64 = 30;

pub const LABEL_NAME: &str = "Contract Name";
pub const LABEL_PARTNER: &str = "Partner";
pub const LABEL_SIGN_DATE: &str = "Sign Date";
pub const LABEL_EXPIRE_DATE: &str = "Expire Date";
pub const LABEL_STATUS: &str = "Status";
pub const LABEL_CREATED_BY: &str = "Created By";
pub const LABEL_PROCESSED: &str = "Processing Status";

const EMPTY_PLACEHOLDER: &str = "(empty)";

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("system fields cannot be deleted")]
    SystemFieldUndeletable,
    #[error("only the label of a system field can be changed")]
    SystemFieldImmutable,
    #[error("invalid contract status '{0}'")]
    InvalidStatus(String),
    #[error("invalid field type '{0}'")]
    InvalidFieldType(String),
}

pub fn validate_status(status: &str) -> Result<(), DomainError> {
    if CONTRACT_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(DomainError::InvalidStatus(status.to_string()))
    }
}

pub fn validate_field_type(field_type: &str) -> Result<(), DomainError> {
    if FIELD_TYPES.contains(&field_type) {
        Ok(())
    } else {
        Err(DomainError::InvalidFieldType(field_type.to_string()))
    }
}

pub fn status_label(status: &str) -> &str {
    match status {
        STATUS_ACTIVE => "Active",
        STATUS_ARCHIVED => "Archived",
        STATUS_VOID => "Void",
        other => other,
    }
}

pub fn processed_label(processed: bool) -> &'static str {
    if processed {
        "Processed"
    } else {
        "Unprocessed"
    }
}

/// Accepts `YYYY-MM-DD` or a full ISO timestamp; only the date part counts,
/// so a time-of-day difference never registers as a change.
pub fn parse_input_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn or_empty(text: String) -> String {
    if text.is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        text
    }
}

/// The subset of a contract an update may touch. `is_processed` is absent on
/// purpose: the processed flag only moves through the explicit process action.
#[derive(Debug, Default)]
pub struct ContractPatch {
    pub name: Option<String>,
    pub partner: Option<String>,
    pub sign_date: Option<NaiveDate>,
    pub expire_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub custom_data: Option<Map<String, Value>>,
}

impl ContractPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.partner.is_none()
            && self.sign_date.is_none()
            && self.expire_date.is_none()
            && self.status.is_none()
            && self.custom_data.is_none()
    }
}

/// Field-by-field diff of a pending update against the stored record. Fields
/// absent from the patch are skipped; custom keys are compared over the union
/// of old and new maps so removed keys still show up.
pub fn generate_change_details(existing: &Contract, patch: &ContractPatch) -> ChangeDetails {
    let mut changes: Vec<FieldChange> = Vec::new();

    if let Some(ref name) = patch.name {
        if *name != existing.name {
            changes.push(FieldChange {
                field: LABEL_NAME.to_string(),
                from: existing.name.clone(),
                to: name.clone(),
            });
        }
    }
    if let Some(ref partner) = patch.partner {
        if *partner != existing.partner {
            changes.push(FieldChange {
                field: LABEL_PARTNER.to_string(),
                from: existing.partner.clone(),
                to: partner.clone(),
            });
        }
    }
    if let Some(sign_date) = patch.sign_date {
        if sign_date != existing.sign_date {
            changes.push(FieldChange {
                field: LABEL_SIGN_DATE.to_string(),
                from: existing.sign_date.to_string(),
                to: sign_date.to_string(),
            });
        }
    }
    if let Some(expire_date) = patch.expire_date {
        if expire_date != existing.expire_date {
            changes.push(FieldChange {
                field: LABEL_EXPIRE_DATE.to_string(),
                from: existing.expire_date.to_string(),
                to: expire_date.to_string(),
            });
        }
    }
    if let Some(ref status) = patch.status {
        if *status != existing.status {
            changes.push(FieldChange {
                field: LABEL_STATUS.to_string(),
                from: status_label(&existing.status).to_string(),
                to: status_label(status).to_string(),
            });
        }
    }

    if let Some(ref new_custom) = patch.custom_data {
        let empty = Map::new();
        let old_custom = existing.custom_data.as_object().unwrap_or(&empty);

        let keys: BTreeSet<&String> = old_custom.keys().chain(new_custom.keys()).collect();
        for key in keys {
            let old_value = old_custom.get(key).map(display_value).unwrap_or_default();
            let new_value = new_custom.get(key).map(display_value).unwrap_or_default();
            if old_value != new_value {
                changes.push(FieldChange {
                    field: key.clone(),
                    from: or_empty(old_value),
                    to: or_empty(new_value),
                });
            }
        }
    }

    ChangeDetails {
        summary: if changes.is_empty() {
            "no changes".to_string()
        } else {
            format!("updated {} fields", changes.len())
        },
        changes,
        contract_name: existing.name.clone(),
    }
}

pub fn create_details(contract: &NewContract) -> CreateDetails {
    let mut fields = std::collections::BTreeMap::new();
    fields.insert(LABEL_NAME.to_string(), contract.name.clone());
    fields.insert(LABEL_PARTNER.to_string(), contract.partner.clone());
    fields.insert(LABEL_SIGN_DATE.to_string(), contract.sign_date.to_string());
    fields.insert(
        LABEL_EXPIRE_DATE.to_string(),
        contract.expire_date.to_string(),
    );
    fields.insert(
        LABEL_STATUS.to_string(),
        status_label(&contract.status).to_string(),
    );
    CreateDetails {
        summary: "created contract".to_string(),
        fields,
    }
}

/// Emitted on every process call, even when the flag was already set; the
/// audit trail records the attempt, not just the transition.
pub fn process_details(existing: &Contract) -> ChangeDetails {
    ChangeDetails {
        summary: "marked as processed".to_string(),
        changes: vec![FieldChange {
            field: LABEL_PROCESSED.to_string(),
            from: processed_label(existing.is_processed).to_string(),
            to: processed_label(true).to_string(),
        }],
        contract_name: existing.name.clone(),
    }
}

pub fn delete_details(existing: &Contract) -> DeleteDetails {
    let mut snapshot = std::collections::BTreeMap::new();
    snapshot.insert(LABEL_NAME.to_string(), existing.name.clone());
    snapshot.insert(LABEL_PARTNER.to_string(), existing.partner.clone());
    snapshot.insert(LABEL_SIGN_DATE.to_string(), existing.sign_date.to_string());
    snapshot.insert(
        LABEL_EXPIRE_DATE.to_string(),
        existing.expire_date.to_string(),
    );
    DeleteDetails {
        summary: "deleted contract".to_string(),
        deleted_contract: snapshot,
    }
}

/// Inclusive bounds of the derived "expiring" bucket.
pub fn expiring_window(today: NaiveDate, days: i64) -> (NaiveDate, NaiveDate) {
    (today, today + chrono::Duration::days(days))
}

/// Half-open `[start, end)` range of the calendar month `offset` months
/// after the one containing `today`.
pub fn month_window(today: NaiveDate, offset: u32) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).expect("day 1 is valid for every month") + Months::new(offset);
    (start, start + Months::new(1))
}

pub fn month_label(month_start: NaiveDate) -> String {
    format!("{:04}-{:02}", month_start.year(), month_start.month())
}

pub struct SystemFieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub field_type: &'static str,
    pub order: i32,
}

pub const SYSTEM_FIELDS: &[SystemFieldSpec] = &[
    SystemFieldSpec {
        key: "name",
        label: LABEL_NAME,
        field_type: FIELD_TYPE_TEXT,
        order: 1,
    },
    SystemFieldSpec {
        key: "partner",
        label: LABEL_PARTNER,
        field_type: FIELD_TYPE_TEXT,
        order: 2,
    },
    SystemFieldSpec {
        key: "signDate",
        label: LABEL_SIGN_DATE,
        field_type: FIELD_TYPE_DATE,
        order: 3,
    },
    SystemFieldSpec {
        key: "expireDate",
        label: LABEL_EXPIRE_DATE,
        field_type: FIELD_TYPE_DATE,
        order: 4,
    },
    SystemFieldSpec {
        key: "status",
        label: LABEL_STATUS,
        field_type: FIELD_TYPE_TEXT,
        order: 5,
    },
    SystemFieldSpec {
        key: "createdBy",
        label: LABEL_CREATED_BY,
        field_type: FIELD_TYPE_TEXT,
        order: 6,
    },
];

/// Insert-if-absent seeding of the six built-in fields. Safe to run on every
/// startup.
pub fn init_system_fields(conn: &mut PgConnection) -> QueryResult<()> {
    for spec in SYSTEM_FIELDS {
        let row = NewContractField {
            id: Uuid::new_v4(),
            key: spec.key.to_string(),
            label: spec.label.to_string(),
            field_type: spec.field_type.to_string(),
            is_system: true,
            is_visible: true,
            display_order: spec.order,
        };
        diesel::insert_into(contract_fields::table)
            .values(&row)
            .on_conflict(contract_fields::key)
            .do_nothing()
            .execute(conn)?;
    }
    Ok(())
}
