//! Per-upload import session state machine.
//!
//! ```text
//! Mapping ──build_preview──▶ Preview ──begin_commit──▶ Committing ──finish_commit──▶ Completed
//!    ▲                          │                                                        │
//!    └──── mapping change ──────┘                                                        │
//!    └──────────────────────────────────── reset ◀───────────────────────────────────────┘
//! ```
//!
//! A session owns the parsed sheet, the current mapping, the preview rows and,
//! once a commit has run, its summary. Transitions that do not fit the
//! current step fail with [`CoreError::Conflict`].

use serde::{Deserialize, Serialize};

use crate::catalog::FieldId;
use crate::commit::{progress_channel, CommitProgress, ImportOutcome, ProgressSender};
use crate::error::CoreError;
use crate::mapping::{auto_detect_mapping, ensure_complete, FieldMapping};
use crate::parser::ParsedSheet;
use crate::preview::{self, ExistingRecordIndex, ImportRow, PreviewSummary};
use crate::report::ImportSummary;
use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStep {
    Mapping,
    Preview,
    Committing,
    Completed,
}

impl ImportStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mapping => "mapping",
            Self::Preview => "preview",
            Self::Committing => "committing",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ImportStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ImportSession {
    file_name: String,
    sheet: ParsedSheet,
    mapping: FieldMapping,
    step: ImportStep,
    rows: Vec<ImportRow>,
    progress: ProgressSender,
    summary: Option<ImportSummary>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl ImportSession {
    /// Start a session over a parsed upload with an auto-detected mapping.
    pub fn new(file_name: impl Into<String>, sheet: ParsedSheet) -> Self {
        let now = chrono::Utc::now();
        Self {
            file_name: file_name.into(),
            mapping: auto_detect_mapping(&sheet.headers),
            sheet,
            step: ImportStep::Mapping,
            rows: Vec::new(),
            progress: progress_channel(),
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    // ── Accessors ──

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn headers(&self) -> &[String] {
        &self.sheet.headers
    }

    pub fn row_count(&self) -> usize {
        self.sheet.rows.len()
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn step(&self) -> ImportStep {
        self.step
    }

    pub fn rows(&self) -> &[ImportRow] {
        &self.rows
    }

    pub fn summary(&self) -> Option<&ImportSummary> {
        self.summary.as_ref()
    }

    pub fn preview_summary(&self) -> PreviewSummary {
        PreviewSummary::from_rows(&self.rows)
    }

    pub fn progress(&self) -> ProgressSender {
        self.progress.clone()
    }

    pub fn progress_snapshot(&self) -> CommitProgress {
        self.progress.borrow().clone()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn is_committing(&self) -> bool {
        self.step == ImportStep::Committing
    }

    // ── Mapping ──

    /// Replace the whole mapping. Drops any preview.
    pub fn replace_mapping(&mut self, mapping: FieldMapping) -> Result<(), CoreError> {
        self.ensure_editable()?;
        self.mapping = mapping;
        self.back_to_mapping();
        Ok(())
    }

    /// Point one header at a field, unmapping its previous holder. Drops any
    /// preview.
    pub fn assign(&mut self, header: &str, field: Option<FieldId>) -> Result<(), CoreError> {
        self.ensure_editable()?;
        self.mapping.assign(header, field)?;
        self.back_to_mapping();
        Ok(())
    }

    // ── Preview ──

    /// Map, validate and duplicate-check every row against `index`.
    pub fn build_preview(&mut self, index: &ExistingRecordIndex) -> Result<PreviewSummary, CoreError> {
        self.ensure_editable()?;
        ensure_complete(&self.mapping)?;
        self.rows = preview::build_preview(&self.sheet.rows, &self.mapping, index);
        self.step = ImportStep::Preview;
        self.touch();
        Ok(self.preview_summary())
    }

    /// Select or deselect one row. Returns the resulting selection, which
    /// stays `false` for rows in error.
    pub fn toggle_row(&mut self, index: usize, selected: bool) -> Result<bool, CoreError> {
        self.ensure_step(ImportStep::Preview)?;
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.index == index)
            .ok_or_else(|| CoreError::NotFound {
                entity: "row",
                id: index.to_string(),
            })?;
        let result = row.set_selected(selected);
        self.touch();
        Ok(result)
    }

    pub fn toggle_all(&mut self, selected: bool) -> Result<PreviewSummary, CoreError> {
        self.ensure_step(ImportStep::Preview)?;
        preview::toggle_all(&mut self.rows, selected);
        self.touch();
        Ok(self.preview_summary())
    }

    // ── Commit ──

    /// Enter the commit step and hand out the selected rows in source order.
    pub fn begin_commit(&mut self) -> Result<Vec<ImportRow>, CoreError> {
        self.ensure_step(ImportStep::Preview)?;
        let selected: Vec<ImportRow> = self.rows.iter().filter(|r| r.selected()).cloned().collect();
        if selected.is_empty() {
            return Err(CoreError::Validation("No rows selected for import".to_string()));
        }
        self.step = ImportStep::Committing;
        self.touch();
        Ok(selected)
    }

    /// Record a finished run.
    pub fn finish_commit(&mut self, outcomes: &[ImportOutcome]) -> Result<&ImportSummary, CoreError> {
        self.ensure_step(ImportStep::Committing)?;
        self.step = ImportStep::Completed;
        self.touch();
        Ok(self.summary.insert(ImportSummary::from_outcomes(outcomes)))
    }

    /// Back to the mapping step with a freshly auto-detected mapping.
    pub fn reset(&mut self) -> Result<(), CoreError> {
        if self.is_committing() {
            return Err(CoreError::Conflict(
                "Cannot reset while a commit is running".to_string(),
            ));
        }
        self.mapping = auto_detect_mapping(&self.sheet.headers);
        self.summary = None;
        self.progress = progress_channel();
        self.back_to_mapping();
        Ok(())
    }

    // ── Internals ──

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }

    fn back_to_mapping(&mut self) {
        self.rows.clear();
        self.step = ImportStep::Mapping;
        self.touch();
    }

    fn ensure_step(&self, expected: ImportStep) -> Result<(), CoreError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Import is in step '{}', expected '{expected}'",
                self.step
            )))
        }
    }

    /// Mapping and preview may be rebuilt until a commit starts.
    fn ensure_editable(&self) -> Result<(), CoreError> {
        match self.step {
            ImportStep::Mapping | ImportStep::Preview => Ok(()),
            step => Err(CoreError::Conflict(format!(
                "Import is in step '{step}', mapping can no longer change"
            ))),
        }
    }
}
