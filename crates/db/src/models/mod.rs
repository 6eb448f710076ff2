//! Row types for the import tables.

pub mod organization;
pub mod person;
