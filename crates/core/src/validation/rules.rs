//! Validation message and row status types.

use serde::{Deserialize, Serialize};

use crate::catalog::FieldId;

/// Whether a message blocks the row from being committed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding about a row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldId>,
    pub severity: Severity,
    pub message: String,
}

impl RowMessage {
    pub fn error(field: FieldId, message: impl Into<String>) -> Self {
        Self {
            field: Some(field),
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(field: FieldId, message: impl Into<String>) -> Self {
        Self {
            field: Some(field),
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Aggregate classification of a row.
///
/// Ordered so that `max` picks the most severe status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Valid,
    Warning,
    Error,
}

impl RowStatus {
    /// `Error` if any message is an error, else `Warning` if any is a
    /// warning, else `Valid`.
    pub fn from_messages(messages: &[RowMessage]) -> Self {
        messages
            .iter()
            .map(|m| match m.severity {
                Severity::Error => Self::Error,
                Severity::Warning => Self::Warning,
            })
            .max()
            .unwrap_or(Self::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
