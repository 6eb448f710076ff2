//! Person (contact) model.

use rolodex_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `people` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Person {
    pub id: DbId,
    pub organization_id: Option<DbId>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub cpf: Option<String>,
    pub job_title: Option<String>,
    pub notes: Option<String>,
    pub label: Option<String>,
    pub lead_source: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
