use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = contracts)]
pub struct Contract {
    pub id: Uuid,
    pub name: String,
    pub partner: String,
    pub sign_date: NaiveDate,
    pub expire_date: NaiveDate,
    pub status: String,
    pub is_processed: bool,
    pub custom_data: serde_json::Value,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = contracts)]
pub struct NewContract {
    pub id: Uuid,
    pub name: String,
    pub partner: String,
    pub sign_date: NaiveDate,
    pub expire_date: NaiveDate,
    pub status: String,
    pub custom_data: serde_json::Value,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = contract_fields)]
pub struct ContractField {
    pub id: Uuid,
    pub key: String,
    pub label: String,
    pub field_type: String,
    pub is_system: bool,
    pub is_visible: bool,
    pub display_order: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = contract_fields)]
pub struct NewContractField {
    pub id: Uuid,
    pub key: String,
    pub label: String,
    pub field_type: String,
    pub is_system: bool,
    pub is_visible: bool,
    pub display_order: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = audit_logs)]
pub struct AuditLog {
    pub id: Uuid,
    pub contract_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog {
    pub id: Uuid,
    pub contract_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = attachments)]
#[diesel(belongs_to(Contract))]
pub struct Attachment {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = attachments)]
pub struct NewAttachment {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub file_name: String,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = system_settings)]
pub struct SystemSetting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = system_settings)]
pub struct NewSystemSetting {
    pub key: String,
    pub value: serde_json::Value,
}
