//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod organization_repo;
pub mod person_repo;

pub use organization_repo::OrganizationRepo;
pub use person_repo::PersonRepo;
