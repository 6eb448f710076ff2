//! In-process [`ImportStore`] backend.
//!
//! Backs the API when no `DATABASE_URL` is configured and serves as the
//! store in unit and integration tests. Matching rules mirror the Postgres
//! repositories: tax ids compare on digits, names compare folded, emails
//! compare case-insensitively, and updates only overwrite columns that are present.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use super::{ExistingKeys, ImportStore, OrganizationFields, PersonFields, StoreError, StoreResult};
use crate::normalize::{digits_only, fold_text, normalize_email};
use crate::types::DbId;

/// A stored organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationRecord {
    pub id: DbId,
    pub fields: OrganizationFields,
}

/// A stored person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonRecord {
    pub id: DbId,
    pub fields: PersonFields,
}

#[derive(Debug, Default)]
struct Tables {
    organizations: Vec<OrganizationRecord>,
    people: Vec<PersonRecord>,
    next_id: DbId,
}

impl Tables {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

/// Thread-safe via interior `RwLock`; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trait calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub async fn organizations(&self) -> Vec<OrganizationRecord> {
        self.tables.read().await.organizations.clone()
    }

    pub async fn people(&self) -> Vec<PersonRecord> {
        self.tables.read().await.people.clone()
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }
}

/// Overwrite `target` only when `source` carries a value.
fn merge<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if source.is_some() {
        target.clone_from(source);
    }
}

#[async_trait]
impl ImportStore for InMemoryStore {
    async fn find_organization_by_tax_id(&self, tax_id: &str) -> StoreResult<Option<DbId>> {
        self.record_call();
        let wanted = digits_only(tax_id);
        if wanted.is_empty() {
            return Ok(None);
        }
        let tables = self.tables.read().await;
        Ok(tables
            .organizations
            .iter()
            .find(|o| o.fields.cnpj.as_deref().map(digits_only).as_deref() == Some(wanted.as_str()))
            .map(|o| o.id))
    }

    async fn find_organization_by_name(&self, name: &str) -> StoreResult<Option<DbId>> {
        self.record_call();
        let wanted = fold_text(name);
        if wanted.is_empty() {
            return Ok(None);
        }
        let tables = self.tables.read().await;
        Ok(tables
            .organizations
            .iter()
            .find(|o| o.fields.name.as_deref().is_some_and(|n| fold_text(n) == wanted))
            .map(|o| o.id))
    }

    async fn upsert_organization(
        &self,
        id: Option<DbId>,
        fields: &OrganizationFields,
    ) -> StoreResult<DbId> {
        self.record_call();
        let mut tables = self.tables.write().await;
        match id {
            Some(id) => {
                let record = tables
                    .organizations
                    .iter_mut()
                    .find(|o| o.id == id)
                    .ok_or_else(|| StoreError::new(format!("organization {id} not found")))?;
                let current = &mut record.fields;
                merge(&mut current.name, &fields.name);
                merge(&mut current.cnpj, &fields.cnpj);
                merge(&mut current.phone, &fields.phone);
                merge(&mut current.email, &fields.email);
                merge(&mut current.automotores, &fields.automotores);
                merge(&mut current.address_city, &fields.address_city);
                merge(&mut current.address_state, &fields.address_state);
                merge(&mut current.address_zipcode, &fields.address_zipcode);
                Ok(id)
            }
            None => {
                let id = tables.allocate_id();
                tables.organizations.push(OrganizationRecord {
                    id,
                    fields: fields.clone(),
                });
                Ok(id)
            }
        }
    }

    async fn find_person_by_email(&self, email: &str) -> StoreResult<Option<DbId>> {
        self.record_call();
        let wanted = normalize_email(email);
        let tables = self.tables.read().await;
        Ok(tables
            .people
            .iter()
            .find(|p| p.fields.email.as_deref().map(normalize_email).as_deref() == Some(wanted.as_str()))
            .map(|p| p.id))
    }

    async fn find_person_by_cpf(&self, cpf: &str) -> StoreResult<Option<DbId>> {
        self.record_call();
        let wanted = digits_only(cpf);
        if wanted.is_empty() {
            return Ok(None);
        }
        let tables = self.tables.read().await;
        Ok(tables
            .people
            .iter()
            .find(|p| p.fields.cpf.as_deref().map(digits_only).as_deref() == Some(wanted.as_str()))
            .map(|p| p.id))
    }

    async fn upsert_person(&self, id: Option<DbId>, fields: &PersonFields) -> StoreResult<DbId> {
        self.record_call();
        let mut tables = self.tables.write().await;
        match id {
            Some(id) => {
                let record = tables
                    .people
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| StoreError::new(format!("person {id} not found")))?;
                let current = &mut record.fields;
                current.name.clone_from(&fields.name);
                merge(&mut current.email, &fields.email);
                merge(&mut current.phone, &fields.phone);
                merge(&mut current.whatsapp, &fields.whatsapp);
                merge(&mut current.cpf, &fields.cpf);
                merge(&mut current.job_title, &fields.job_title);
                merge(&mut current.notes, &fields.notes);
                merge(&mut current.label, &fields.label);
                merge(&mut current.lead_source, &fields.lead_source);
                merge(&mut current.organization_id, &fields.organization_id);
                Ok(id)
            }
            None => {
                let id = tables.allocate_id();
                tables.people.push(PersonRecord {
                    id,
                    fields: fields.clone(),
                });
                Ok(id)
            }
        }
    }

    async fn snapshot_existing_keys(&self) -> StoreResult<ExistingKeys> {
        self.record_call();
        let tables = self.tables.read().await;
        Ok(ExistingKeys {
            emails: tables
                .people
                .iter()
                .filter_map(|p| p.fields.email.clone())
                .collect(),
            cpfs: tables
                .people
                .iter()
                .filter_map(|p| p.fields.cpf.clone())
                .collect(),
            cnpjs: tables
                .organizations
                .iter()
                .filter_map(|o| o.fields.cnpj.clone())
                .collect(),
        })
    }
}
