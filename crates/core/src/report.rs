//! Final import summary, aggregated from the outcome log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::commit::{EntityAction, EntityType, ImportOutcome};

/// Created/updated counts for one entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    pub created: usize,
    pub updated: usize,
}

impl ActionCounts {
    fn record(&mut self, action: EntityAction) {
        match action {
            EntityAction::Created => self.created += 1,
            EntityAction::Updated => self.updated += 1,
        }
    }
}

/// A row that failed during commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailureReport {
    pub row_index: usize,
    pub label: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub organizations: ActionCounts,
    pub people: ActionCounts,
    pub failures: Vec<RowFailureReport>,
}

impl ImportSummary {
    pub fn from_outcomes(outcomes: &[ImportOutcome]) -> Self {
        let mut by_type: BTreeMap<EntityType, ActionCounts> = BTreeMap::new();
        let mut failures = Vec::new();

        for outcome in outcomes {
            for entity in &outcome.entities {
                by_type
                    .entry(entity.entity_type)
                    .or_default()
                    .record(entity.action);
            }
            if let Some(message) = &outcome.error {
                failures.push(RowFailureReport {
                    row_index: outcome.row_index,
                    label: outcome.label.clone(),
                    message: message.clone(),
                });
            }
        }

        Self {
            total: outcomes.len(),
            succeeded: outcomes.len() - failures.len(),
            failed: failures.len(),
            organizations: by_type
                .get(&EntityType::Organization)
                .copied()
                .unwrap_or_default(),
            people: by_type.get(&EntityType::Person).copied().unwrap_or_default(),
            failures,
        }
    }
}
