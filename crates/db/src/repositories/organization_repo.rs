//! Repository for the `organizations` table.

use rolodex_core::normalize::{digits_only, fold_text, normalize_tax_id};
use rolodex_core::store::OrganizationFields;
use rolodex_core::types::DbId;
use sqlx::PgPool;

use crate::models::organization::Organization;

/// Column list for organizations queries.
const COLUMNS: &str = "id, name, cnpj, phone, email, automotores, \
    address_city, address_state, address_zipcode, created_at, updated_at";

/// Lookup and write operations for organizations.
///
/// Writes store `cnpj` as digits and keep `name_key` equal to the folded
/// name, so lookups compare plain indexed columns.
pub struct OrganizationRepo;

impl OrganizationRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Organization>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM organizations WHERE id = $1");
        sqlx::query_as::<_, Organization>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find by CNPJ, comparing digits only.
    pub async fn find_id_by_tax_id(pool: &PgPool, tax_id: &str) -> Result<Option<DbId>, sqlx::Error> {
        let Some(digits) = normalize_tax_id(tax_id) else {
            return Ok(None);
        };
        sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM organizations WHERE cnpj = $1 ORDER BY id LIMIT 1",
        )
        .bind(digits)
        .fetch_optional(pool)
        .await
    }

    /// Find by folded name, so case, accents and punctuation are ignored.
    pub async fn find_id_by_name(pool: &PgPool, name: &str) -> Result<Option<DbId>, sqlx::Error> {
        let key = fold_text(name);
        if key.is_empty() {
            return Ok(None);
        }
        sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM organizations WHERE name_key = $1 ORDER BY id LIMIT 1",
        )
        .bind(key)
        .fetch_optional(pool)
        .await
    }

    /// Insert a new organization. `name` must be present.
    pub async fn create(pool: &PgPool, input: &OrganizationFields) -> Result<Organization, sqlx::Error> {
        let query = format!(
            "INSERT INTO organizations
                (name, name_key, cnpj, phone, email, automotores,
                 address_city, address_state, address_zipcode)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Organization>(&query)
            .bind(&input.name)
            .bind(input.name.as_deref().map(fold_text))
            .bind(input.cnpj.as_deref().map(digits_only))
            .bind(&input.phone)
            .bind(&input.email)
            .bind(input.automotores)
            .bind(&input.address_city)
            .bind(&input.address_state)
            .bind(&input.address_zipcode)
            .fetch_one(pool)
            .await
    }

    /// Overwrite only the columns present in `input`.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &OrganizationFields,
    ) -> Result<Option<Organization>, sqlx::Error> {
        let query = format!(
            "UPDATE organizations SET
                name = COALESCE($2, name),
                cnpj = COALESCE($3, cnpj),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                automotores = COALESCE($6, automotores),
                address_city = COALESCE($7, address_city),
                address_state = COALESCE($8, address_state),
                address_zipcode = COALESCE($9, address_zipcode),
                name_key = COALESCE($10, name_key),
                updated_at = now()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Organization>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(input.cnpj.as_deref().map(digits_only))
            .bind(&input.phone)
            .bind(&input.email)
            .bind(input.automotores)
            .bind(&input.address_city)
            .bind(&input.address_state)
            .bind(&input.address_zipcode)
            .bind(input.name.as_deref().map(fold_text))
            .fetch_optional(pool)
            .await
    }

    /// Every stored CNPJ, for the duplicate preview.
    pub async fn list_tax_ids(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT cnpj FROM organizations WHERE cnpj IS NOT NULL")
            .fetch_all(pool)
            .await
    }
}
