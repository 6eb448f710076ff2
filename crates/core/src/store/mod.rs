//! Persistence seam for the importer.
//!
//! The preview and commit stages reach contacts and companies only through
//! [`ImportStore`]. `rolodex-db` provides the Postgres backend; [`memory`]
//! holds an in-process backend used for development and tests.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::DbId;

pub use memory::InMemoryStore;

/// A failure reported by a store backend. Carries the backend's message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

/// Organization columns carried by one import row.
///
/// `None` means "not present in the row": inserts leave the column empty and
/// updates leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationFields {
    pub name: Option<String>,
    /// Digits only.
    pub cnpj: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub automotores: Option<i32>,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_zipcode: Option<String>,
}

/// Person columns carried by one import row. Same `None` semantics as
/// [`OrganizationFields`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonFields {
    pub name: String,
    /// Lowercased.
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    /// Digits only.
    pub cpf: Option<String>,
    pub job_title: Option<String>,
    pub notes: Option<String>,
    pub label: Option<String>,
    pub lead_source: Option<String>,
    /// Organization link. On update, `None` keeps the current link.
    pub organization_id: Option<DbId>,
}

/// Raw duplicate keys already present in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingKeys {
    pub emails: Vec<String>,
    pub cpfs: Vec<String>,
    pub cnpjs: Vec<String>,
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Lookup and write operations the importer needs from persistence.
///
/// Upserts take the id returned by a previous lookup: `None` inserts a new
/// record, `Some(id)` performs a non-destructive update of that record.
#[async_trait]
pub trait ImportStore: Send + Sync {
    // ── Organizations ──

    /// Match on digit-only CNPJ.
    async fn find_organization_by_tax_id(&self, tax_id: &str) -> StoreResult<Option<DbId>>;

    /// Case-insensitive match on the organization name.
    async fn find_organization_by_name(&self, name: &str) -> StoreResult<Option<DbId>>;

    async fn upsert_organization(
        &self,
        id: Option<DbId>,
        fields: &OrganizationFields,
    ) -> StoreResult<DbId>;

    // ── People ──

    async fn find_person_by_email(&self, email: &str) -> StoreResult<Option<DbId>>;

    /// Match on digit-only CPF.
    async fn find_person_by_cpf(&self, cpf: &str) -> StoreResult<Option<DbId>>;

    async fn upsert_person(&self, id: Option<DbId>, fields: &PersonFields) -> StoreResult<DbId>;

    // ── Preview support ──

    async fn snapshot_existing_keys(&self) -> StoreResult<ExistingKeys>;

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
