//! Import preview: validated rows annotated with duplicate hints.
//!
//! Duplicate detection here is advisory. A collision only tells the operator
//! that the row will probably update an existing record; the commit executor
//! makes the authoritative create-vs-update decision against live data.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::FieldId;
use crate::mapping::{FieldMapping, MappedData};
use crate::normalize::{digits_only, normalize_email};
use crate::parser::SourceRow;
use crate::store::ExistingKeys;
use crate::validation::{validate_mapped, RowMessage, RowStatus};

pub const MSG_EMAIL_EXISTS: &str = "Email existe";
pub const MSG_CPF_EXISTS: &str = "CPF existe";
pub const MSG_CNPJ_EXISTS: &str = "CNPJ existe";

// ---------------------------------------------------------------------------
// Existing record index
// ---------------------------------------------------------------------------

/// Read-only snapshot of normalized keys already present in the store.
#[derive(Debug, Clone, Default)]
pub struct ExistingRecordIndex {
    emails: HashSet<String>,
    cpfs: HashSet<String>,
    cnpjs: HashSet<String>,
}

impl ExistingRecordIndex {
    /// Normalize a raw store snapshot. Blank keys are dropped.
    pub fn from_keys(keys: ExistingKeys) -> Self {
        let normalize = |values: Vec<String>, f: fn(&str) -> String| -> HashSet<String> {
            values
                .iter()
                .map(|v| f(v))
                .filter(|v| !v.is_empty())
                .collect()
        };
        Self {
            emails: normalize(keys.emails, normalize_email),
            cpfs: normalize(keys.cpfs, digits_only),
            cnpjs: normalize(keys.cnpjs, digits_only),
        }
    }

    pub fn has_email(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    pub fn has_cpf(&self, cpf: &str) -> bool {
        let digits = digits_only(cpf);
        !digits.is_empty() && self.cpfs.contains(&digits)
    }

    pub fn has_cnpj(&self, cnpj: &str) -> bool {
        let digits = digits_only(cnpj);
        !digits.is_empty() && self.cnpjs.contains(&digits)
    }
}

// ---------------------------------------------------------------------------
// Import row
// ---------------------------------------------------------------------------

/// A mapped, validated row as shown in the preview table.
///
/// `selected` is private so that `status = Error => !selected` holds for
/// every row at every point of the session.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRow {
    pub index: usize,
    pub raw_data: IndexMap<String, String>,
    pub mapped_data: MappedData,
    pub status: RowStatus,
    pub messages: Vec<RowMessage>,
    selected: bool,
}

impl ImportRow {
    /// Map and validate one source row. Selected by default unless in error.
    pub fn from_source(row: &SourceRow, mapping: &FieldMapping) -> Self {
        let mapped_data = mapping.apply(row);
        let messages = validate_mapped(&mapped_data);
        let status = RowStatus::from_messages(&messages);
        Self {
            index: row.index,
            raw_data: row.values.clone(),
            mapped_data,
            status,
            messages,
            selected: status != RowStatus::Error,
        }
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    /// Request a selection state. Rows in error always stay deselected.
    ///
    /// Returns the resulting selection.
    pub fn set_selected(&mut self, selected: bool) -> bool {
        self.selected = selected && self.status != RowStatus::Error;
        self.selected
    }

    pub fn value(&self, field: FieldId) -> Option<&str> {
        self.mapped_data.get(&field).map(String::as_str)
    }

    /// Display label: the person's name, else the organization's, else
    /// the row number.
    pub fn label(&self) -> String {
        self.value(FieldId::Name)
            .or_else(|| self.value(FieldId::OrgName))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Linha {}", self.index + 1))
    }

    /// Append a duplicate hint. Only ever escalates `Valid` to `Warning`.
    fn flag_duplicate(&mut self, field: FieldId, message: &str) {
        self.messages.push(RowMessage::warning(field, message));
        if self.status == RowStatus::Valid {
            self.status = RowStatus::Warning;
        }
    }
}

/// Annotate rows whose email, CPF or CNPJ already exist in the store.
pub fn annotate_duplicates(rows: &mut [ImportRow], index: &ExistingRecordIndex) {
    for row in rows.iter_mut() {
        let email_hit = row.value(FieldId::Email).is_some_and(|e| index.has_email(e));
        let cpf_hit = row.value(FieldId::Cpf).is_some_and(|c| index.has_cpf(c));
        let cnpj_hit = row.value(FieldId::Cnpj).is_some_and(|c| index.has_cnpj(c));

        if email_hit {
            row.flag_duplicate(FieldId::Email, MSG_EMAIL_EXISTS);
        }
        if cpf_hit {
            row.flag_duplicate(FieldId::Cpf, MSG_CPF_EXISTS);
        }
        if cnpj_hit {
            row.flag_duplicate(FieldId::Cnpj, MSG_CNPJ_EXISTS);
        }
    }
}

/// Map, validate and duplicate-check every source row.
pub fn build_preview(
    rows: &[SourceRow],
    mapping: &FieldMapping,
    index: &ExistingRecordIndex,
) -> Vec<ImportRow> {
    let mut import_rows: Vec<ImportRow> = rows
        .iter()
        .map(|row| ImportRow::from_source(row, mapping))
        .collect();
    annotate_duplicates(&mut import_rows, index);
    import_rows
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Select or deselect every row. Rows in error are never selected.
pub fn toggle_all(rows: &mut [ImportRow], selected: bool) {
    for row in rows.iter_mut() {
        row.set_selected(selected);
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Aggregate counts shown above the preview table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSummary {
    pub total: usize,
    pub valid: usize,
    pub warning: usize,
    pub error: usize,
    pub selected: usize,
}

impl PreviewSummary {
    pub fn from_rows(rows: &[ImportRow]) -> Self {
        let mut by_status: BTreeMap<RowStatus, usize> = BTreeMap::new();
        for row in rows {
            *by_status.entry(row.status).or_default() += 1;
        }
        Self {
            total: rows.len(),
            valid: by_status.get(&RowStatus::Valid).copied().unwrap_or(0),
            warning: by_status.get(&RowStatus::Warning).copied().unwrap_or(0),
            error: by_status.get(&RowStatus::Error).copied().unwrap_or(0),
            selected: rows.iter().filter(|r| r.selected()).count(),
        }
    }
}
