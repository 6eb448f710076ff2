//! Repository for the `people` table.

use rolodex_core::normalize::{digits_only, normalize_email, normalize_tax_id};
use rolodex_core::store::PersonFields;
use rolodex_core::types::DbId;
use sqlx::PgPool;

use crate::models::person::Person;

/// Column list for people queries.
const COLUMNS: &str = "id, organization_id, name, email, phone, whatsapp, cpf, \
    job_title, notes, label, lead_source, created_at, updated_at";

/// Lookup and write operations for people.
pub struct PersonRepo;

impl PersonRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Person>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM people WHERE id = $1");
        sqlx::query_as::<_, Person>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive email match. Emails are stored lowercased.
    pub async fn find_id_by_email(pool: &PgPool, email: &str) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>("SELECT id FROM people WHERE email = $1 ORDER BY id LIMIT 1")
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Find by CPF, comparing digits only. CPFs are stored as digits.
    pub async fn find_id_by_cpf(pool: &PgPool, cpf: &str) -> Result<Option<DbId>, sqlx::Error> {
        let Some(digits) = normalize_tax_id(cpf) else {
            return Ok(None);
        };
        sqlx::query_scalar::<_, DbId>("SELECT id FROM people WHERE cpf = $1 ORDER BY id LIMIT 1")
            .bind(digits)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &PgPool, input: &PersonFields) -> Result<Person, sqlx::Error> {
        let query = format!(
            "INSERT INTO people
                (organization_id, name, email, phone, whatsapp, cpf,
                 job_title, notes, label, lead_source)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Person>(&query)
            .bind(input.organization_id)
            .bind(&input.name)
            .bind(input.email.as_deref().map(normalize_email))
            .bind(&input.phone)
            .bind(&input.whatsapp)
            .bind(input.cpf.as_deref().map(digits_only))
            .bind(&input.job_title)
            .bind(&input.notes)
            .bind(&input.label)
            .bind(&input.lead_source)
            .fetch_one(pool)
            .await
    }

    /// Overwrite the name and every other column present in `input`.
    ///
    /// A `None` organization keeps the current link.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &PersonFields,
    ) -> Result<Option<Person>, sqlx::Error> {
        let query = format!(
            "UPDATE people SET
                name = $2,
                organization_id = COALESCE($3, organization_id),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                whatsapp = COALESCE($6, whatsapp),
                cpf = COALESCE($7, cpf),
                job_title = COALESCE($8, job_title),
                notes = COALESCE($9, notes),
                label = COALESCE($10, label),
                lead_source = COALESCE($11, lead_source),
                updated_at = now()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Person>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(input.organization_id)
            .bind(input.email.as_deref().map(normalize_email))
            .bind(&input.phone)
            .bind(&input.whatsapp)
            .bind(input.cpf.as_deref().map(digits_only))
            .bind(&input.job_title)
            .bind(&input.notes)
            .bind(&input.label)
            .bind(&input.lead_source)
            .fetch_optional(pool)
            .await
    }

    /// Every stored email, for the duplicate preview.
    pub async fn list_emails(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT email FROM people WHERE email IS NOT NULL")
            .fetch_all(pool)
            .await
    }

    /// Every stored CPF, for the duplicate preview.
    pub async fn list_cpfs(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT cpf FROM people WHERE cpf IS NOT NULL")
            .fetch_all(pool)
            .await
    }
}
