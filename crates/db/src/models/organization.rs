//! Organization model.

use rolodex_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `organizations` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Organization {
    pub id: DbId,
    pub name: String,
    pub cnpj: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub automotores: Option<i32>,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zipcode: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
