//! Sequential commit executor.
//!
//! Writes the selected preview rows to the store one at a time, in source
//! order. Each row resolves its organization first (through a run-scoped
//! [`OrganizationCache`]) and then its person. A store failure is recorded on
//! that row's outcome and the run moves on, so every row handed to the
//! executor yields exactly one [`ImportOutcome`].
//!
//! Progress is published on a `tokio::sync::watch` channel after every row.
//! Rows must stay sequential: the cache has a single writer and is what keeps
//! two rows naming the same new company from creating it twice.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::Instrument;

use crate::catalog::FieldId;
use crate::mapping::MappedData;
use crate::normalize::{fold_text, normalize_email, normalize_tax_id};
use crate::preview::ImportRow;
use crate::store::{ImportStore, OrganizationFields, PersonFields, StoreError};
use crate::types::DbId;
use crate::validation::evaluator::{MSG_AUTOMOTORES_NUMERIC, MSG_NAME_REQUIRED};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Organization,
    Person,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Person => "person",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Created,
    Updated,
}

impl EntityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

impl std::fmt::Display for EntityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entity written while processing a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOutcome {
    pub entity_type: EntityType,
    pub label: String,
    pub action: EntityAction,
    pub id: DbId,
}

/// What happened to one selected row.
///
/// `entities` lists the writes that succeeded, in order. When `error` is set
/// the row failed after those writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub row_index: usize,
    pub label: String,
    pub entities: Vec<EntityOutcome>,
    pub error: Option<String>,
}

impl ImportOutcome {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// The entity of `entity_type` touched by this row, if any.
    pub fn entity(&self, entity_type: EntityType) -> Option<&EntityOutcome> {
        self.entities.iter().find(|e| e.entity_type == entity_type)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot published after every processed row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitProgress {
    pub state: RunState,
    pub processed: usize,
    pub total_selected: usize,
    pub outcomes: Vec<ImportOutcome>,
}

impl CommitProgress {
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Shared handle to a run's progress channel.
pub type ProgressSender = Arc<watch::Sender<CommitProgress>>;

/// A fresh idle progress channel.
pub fn progress_channel() -> ProgressSender {
    let (tx, _rx) = watch::channel(CommitProgress::default());
    Arc::new(tx)
}

// ---------------------------------------------------------------------------
// Organization cache
// ---------------------------------------------------------------------------

/// Run-scoped map from organization key to resolved id.
///
/// The key is the digit-only CNPJ when present, otherwise the folded
/// organization name.
#[derive(Debug, Default)]
pub struct OrganizationCache {
    entries: HashMap<String, DbId>,
}

impl OrganizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a row, or `None` when it names no organization.
    pub fn key_for(data: &MappedData) -> Option<String> {
        if let Some(tax_id) = data.get(&FieldId::Cnpj).and_then(|c| normalize_tax_id(c)) {
            return Some(tax_id);
        }
        data.get(&FieldId::OrgName)
            .map(|name| fold_text(name))
            .filter(|key| !key.is_empty())
    }

    pub fn get(&self, key: &str) -> Option<DbId> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: String, id: DbId) {
        self.entries.insert(key, id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// A row-level failure: either a store error or a data problem caught late.
#[derive(Debug, thiserror::Error)]
enum RowFailure {
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Data(&'static str),
}

/// Processes one commit run against a store.
pub struct CommitExecutor {
    store: Arc<dyn ImportStore>,
    progress: ProgressSender,
    cache: OrganizationCache,
}

impl CommitExecutor {
    pub fn new(store: Arc<dyn ImportStore>, progress: ProgressSender) -> Self {
        Self {
            store,
            progress,
            cache: OrganizationCache::new(),
        }
    }

    /// Commit the selected rows in order and return one outcome per row.
    ///
    /// Deselected rows, which include every row in error, are skipped.
    pub async fn run(mut self, rows: Vec<ImportRow>) -> Vec<ImportOutcome> {
        let rows: Vec<ImportRow> = rows.into_iter().filter(ImportRow::selected).collect();
        let span = tracing::info_span!("commit_run", total = rows.len());
        async move {
            let total = rows.len();
            self.progress.send_replace(CommitProgress {
                state: RunState::Running,
                processed: 0,
                total_selected: total,
                outcomes: Vec::with_capacity(total),
            });
            tracing::info!(total, "Import commit started");

            let mut outcomes = Vec::with_capacity(total);
            for row in &rows {
                let outcome = self.process_row(row).await;
                match &outcome.error {
                    Some(error) => tracing::warn!(
                        row_index = row.index,
                        error = %error,
                        "Import row failed",
                    ),
                    None => tracing::debug!(
                        row_index = row.index,
                        entities = outcome.entities.len(),
                        "Import row committed",
                    ),
                }
                self.progress.send_modify(|p| {
                    p.processed += 1;
                    p.outcomes.push(outcome.clone());
                });
                outcomes.push(outcome);
            }

            self.progress.send_modify(|p| p.state = RunState::Completed);
            let failed = outcomes.iter().filter(|o| o.failed()).count();
            tracing::info!(total, failed, "Import commit finished");
            outcomes
        }
        .instrument(span)
        .await
    }

    async fn process_row(&mut self, row: &ImportRow) -> ImportOutcome {
        let mut entities = Vec::new();
        let result = self.write_row(row, &mut entities).await;
        ImportOutcome {
            row_index: row.index,
            label: row.label(),
            entities,
            error: result.err().map(|e| e.to_string()),
        }
    }

    async fn write_row(
        &mut self,
        row: &ImportRow,
        entities: &mut Vec<EntityOutcome>,
    ) -> Result<(), RowFailure> {
        let organization_id = self.resolve_organization(&row.mapped_data, entities).await?;
        self.resolve_person(&row.mapped_data, organization_id, entities)
            .await
    }

    /// Find-or-create the row's organization. Cache hits touch no store.
    async fn resolve_organization(
        &mut self,
        data: &MappedData,
        entities: &mut Vec<EntityOutcome>,
    ) -> Result<Option<DbId>, RowFailure> {
        let Some(key) = OrganizationCache::key_for(data) else {
            return Ok(None);
        };
        if let Some(id) = self.cache.get(&key) {
            return Ok(Some(id));
        }

        let fields = organization_fields(data)?;
        let mut existing = None;
        if let Some(tax_id) = &fields.cnpj {
            existing = self.store.find_organization_by_tax_id(tax_id).await?;
        }
        if existing.is_none() {
            if let Some(name) = &fields.name {
                existing = self.store.find_organization_by_name(name).await?;
            }
        }

        let action = match existing {
            Some(_) => EntityAction::Updated,
            None if fields.name.is_some() => EntityAction::Created,
            None => return Ok(None),
        };
        let id = self.store.upsert_organization(existing, &fields).await?;
        tracing::debug!(organization_id = id, action = %action, "Organization resolved");

        self.cache.insert(key, id);
        entities.push(EntityOutcome {
            entity_type: EntityType::Organization,
            label: fields.name.or(fields.cnpj).unwrap_or_default(),
            action,
            id,
        });
        Ok(Some(id))
    }

    /// Find-or-create the row's person, linked to `organization_id`.
    async fn resolve_person(
        &self,
        data: &MappedData,
        organization_id: Option<DbId>,
        entities: &mut Vec<EntityOutcome>,
    ) -> Result<(), RowFailure> {
        let fields = person_fields(data, organization_id)?;

        let mut existing = None;
        if let Some(email) = &fields.email {
            existing = self.store.find_person_by_email(email).await?;
        }
        if existing.is_none() {
            if let Some(cpf) = &fields.cpf {
                existing = self.store.find_person_by_cpf(cpf).await?;
            }
        }

        let action = if existing.is_some() {
            EntityAction::Updated
        } else {
            EntityAction::Created
        };
        let id = self.store.upsert_person(existing, &fields).await?;
        tracing::debug!(person_id = id, action = %action, "Person resolved");

        entities.push(EntityOutcome {
            entity_type: EntityType::Person,
            label: fields.name,
            action,
            id,
        });
        Ok(())
    }
}

fn text(data: &MappedData, field: FieldId) -> Option<String> {
    data.get(&field).cloned()
}

fn organization_fields(data: &MappedData) -> Result<OrganizationFields, RowFailure> {
    let automotores = match data.get(&FieldId::Automotores) {
        Some(value) => Some(
            value
                .parse::<i32>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or(RowFailure::Data(MSG_AUTOMOTORES_NUMERIC))?,
        ),
        None => None,
    };
    Ok(OrganizationFields {
        name: text(data, FieldId::OrgName),
        cnpj: data.get(&FieldId::Cnpj).and_then(|c| normalize_tax_id(c)),
        phone: text(data, FieldId::OrgPhone),
        email: data.get(&FieldId::OrgEmail).map(|e| normalize_email(e)),
        automotores,
        address_city: text(data, FieldId::AddressCity),
        address_state: data.get(&FieldId::AddressState).map(|s| s.to_uppercase()),
        address_zipcode: text(data, FieldId::AddressZipcode),
    })
}

fn person_fields(
    data: &MappedData,
    organization_id: Option<DbId>,
) -> Result<PersonFields, RowFailure> {
    let name = text(data, FieldId::Name).ok_or(RowFailure::Data(MSG_NAME_REQUIRED))?;
    Ok(PersonFields {
        name,
        email: data.get(&FieldId::Email).map(|e| normalize_email(e)),
        phone: text(data, FieldId::Phone),
        whatsapp: text(data, FieldId::Whatsapp),
        cpf: data.get(&FieldId::Cpf).and_then(|c| normalize_tax_id(c)),
        job_title: text(data, FieldId::JobTitle),
        notes: text(data, FieldId::Notes),
        label: text(data, FieldId::Label),
        lead_source: text(data, FieldId::LeadSource),
        organization_id,
    })
}
