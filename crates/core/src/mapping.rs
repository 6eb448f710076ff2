//! Field mapping engine: source headers to catalog fields.
//!
//! A [`FieldMapping`] is a partial, at-most-one-to-one function from header to
//! [`FieldId`]. Every mutation path preserves that invariant: auto-detection
//! leaves later duplicates unmapped, [`FieldMapping::assign`] repairs by
//! unmapping the previous holder, and [`FieldMapping::from_pairs`] rejects
//! caller-supplied mappings that break it.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::catalog::{required_fields, FieldId};
use crate::error::CoreError;
use crate::normalize::fold_text;
use crate::parser::SourceRow;

/// Mapped values of one row, keyed by target field.
pub type MappedData = BTreeMap<FieldId, String>;

/// Header -> target field assignment for one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    /// Every known header in column order; `None` means unmapped.
    entries: IndexMap<String, Option<FieldId>>,
}

impl FieldMapping {
    /// An all-unmapped mapping over `headers`.
    pub fn unmapped(headers: &[String]) -> Self {
        Self {
            entries: headers.iter().map(|h| (h.clone(), None)).collect(),
        }
    }

    /// Build a mapping from caller-supplied pairs.
    ///
    /// Headers absent from `pairs` stay unmapped. Fails when a header is
    /// unknown or when one field is targeted by two headers.
    pub fn from_pairs<'a, I>(headers: &[String], pairs: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (&'a str, Option<FieldId>)>,
    {
        let mut mapping = Self::unmapped(headers);
        for (header, field) in pairs {
            let slot = mapping
                .entries
                .get_mut(header)
                .ok_or_else(|| CoreError::Validation(format!("Unknown column '{header}'")))?;
            *slot = field;
        }

        {
            let mut holders: BTreeMap<FieldId, &str> = BTreeMap::new();
            for (header, field) in mapping.mapped() {
                if let Some(previous) = holders.insert(field, header) {
                    return Err(CoreError::Validation(format!(
                        "Field '{field}' is mapped from both '{previous}' and '{header}'"
                    )));
                }
            }
        }
        Ok(mapping)
    }

    /// Point `header` at `field` (or unmap it with `None`).
    ///
    /// If another header already held `field`, that header becomes unmapped.
    pub fn assign(&mut self, header: &str, field: Option<FieldId>) -> Result<(), CoreError> {
        if !self.entries.contains_key(header) {
            return Err(CoreError::Validation(format!("Unknown column '{header}'")));
        }
        if let Some(field) = field {
            for (other, target) in self.entries.iter_mut() {
                if other != header && *target == Some(field) {
                    *target = None;
                }
            }
        }
        self.entries.insert(header.to_string(), field);
        Ok(())
    }

    /// Target of `header`, if mapped.
    pub fn target(&self, header: &str) -> Option<FieldId> {
        self.entries.get(header).copied().flatten()
    }

    /// Header currently mapped to `field`.
    pub fn header_for(&self, field: FieldId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, target)| **target == Some(field))
            .map(|(header, _)| header.as_str())
    }

    /// Known headers in column order.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(header, field)` for every mapped header, in column order.
    pub fn mapped(&self) -> impl Iterator<Item = (&str, FieldId)> {
        self.entries
            .iter()
            .filter_map(|(h, f)| f.map(|f| (h.as_str(), f)))
    }

    /// Project a source row onto the catalog. Blank values are omitted.
    pub fn apply(&self, row: &SourceRow) -> MappedData {
        self.mapped()
            .filter_map(|(header, field)| {
                let value = row.get(header)?.trim();
                (!value.is_empty()).then(|| (field, value.to_string()))
            })
            .collect()
    }
}

impl Serialize for FieldMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

/// Propose a mapping from header synonyms.
///
/// Each header is folded and tested against every field's synonym set in
/// catalog order; the first match wins. A field already claimed by an
/// earlier header is not assigned again.
pub fn auto_detect_mapping(headers: &[String]) -> FieldMapping {
    let mut mapping = FieldMapping::unmapped(headers);
    for header in headers {
        let folded = fold_text(header);
        let candidate = FieldId::ALL
            .into_iter()
            .find(|field| field.synonyms().contains(&folded.as_str()));
        if let Some(field) = candidate {
            if mapping.header_for(field).is_none() {
                mapping.entries.insert(header.clone(), Some(field));
            }
        }
    }
    mapping
}

/// Whether every required field has a source column.
pub fn can_advance(mapping: &FieldMapping) -> bool {
    missing_required(mapping).is_none()
}

/// First required field that is not mapped, if any.
pub fn missing_required(mapping: &FieldMapping) -> Option<FieldId> {
    required_fields().find(|field| mapping.header_for(*field).is_none())
}

/// `Ok` when the mapping may advance to the preview step.
pub fn ensure_complete(mapping: &FieldMapping) -> Result<(), CoreError> {
    match missing_required(mapping) {
        Some(field) => Err(CoreError::MappingIncomplete(field.as_str())),
        None => Ok(()),
    }
}
