//! Rolodex import core.
//!
//! Pure domain logic for the bulk contact/company importer: tabular parsing,
//! field mapping, row validation, duplicate preview, the sequential commit
//! executor and its outcome reporter. Persistence is reached only through the
//! [`store::ImportStore`] trait, so this crate carries no SQL and no HTTP.

pub mod catalog;
pub mod commit;
pub mod error;
pub mod mapping;
pub mod normalize;
pub mod parser;
pub mod preview;
pub mod report;
pub mod session;
pub mod store;
pub mod types;
pub mod validation;
