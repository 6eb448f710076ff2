//! Postgres-backed [`ImportStore`].

use async_trait::async_trait;
use rolodex_core::store::{
    ExistingKeys, ImportStore, OrganizationFields, PersonFields, StoreError, StoreResult,
};
use rolodex_core::types::DbId;

use crate::repositories::{OrganizationRepo, PersonRepo};
use crate::DbPool;

/// Import store over the `organizations` and `people` tables.
#[derive(Debug, Clone)]
pub struct PgImportStore {
    pool: DbPool,
}

impl PgImportStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn store_err(e: sqlx::Error) -> StoreError {
    tracing::error!(error = %e, "Import store query failed");
    StoreError::new(e.to_string())
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn find_organization_by_tax_id(&self, tax_id: &str) -> StoreResult<Option<DbId>> {
        OrganizationRepo::find_id_by_tax_id(&self.pool, tax_id)
            .await
            .map_err(store_err)
    }

    async fn find_organization_by_name(&self, name: &str) -> StoreResult<Option<DbId>> {
        OrganizationRepo::find_id_by_name(&self.pool, name)
            .await
            .map_err(store_err)
    }

    async fn upsert_organization(
        &self,
        id: Option<DbId>,
        fields: &OrganizationFields,
    ) -> StoreResult<DbId> {
        match id {
            Some(id) => OrganizationRepo::update(&self.pool, id, fields)
                .await
                .map_err(store_err)?
                .map(|org| org.id)
                .ok_or_else(|| StoreError::new(format!("organization {id} not found"))),
            None => {
                if fields.name.is_none() {
                    return Err(StoreError::new("organization name is required"));
                }
                OrganizationRepo::create(&self.pool, fields)
                    .await
                    .map(|org| org.id)
                    .map_err(store_err)
            }
        }
    }

    async fn find_person_by_email(&self, email: &str) -> StoreResult<Option<DbId>> {
        PersonRepo::find_id_by_email(&self.pool, email)
            .await
            .map_err(store_err)
    }

    async fn find_person_by_cpf(&self, cpf: &str) -> StoreResult<Option<DbId>> {
        PersonRepo::find_id_by_cpf(&self.pool, cpf)
            .await
            .map_err(store_err)
    }

    async fn upsert_person(&self, id: Option<DbId>, fields: &PersonFields) -> StoreResult<DbId> {
        match id {
            Some(id) => PersonRepo::update(&self.pool, id, fields)
                .await
                .map_err(store_err)?
                .map(|person| person.id)
                .ok_or_else(|| StoreError::new(format!("person {id} not found"))),
            None => PersonRepo::create(&self.pool, fields)
                .await
                .map(|person| person.id)
                .map_err(store_err),
        }
    }

    async fn snapshot_existing_keys(&self) -> StoreResult<ExistingKeys> {
        Ok(ExistingKeys {
            emails: PersonRepo::list_emails(&self.pool).await.map_err(store_err)?,
            cpfs: PersonRepo::list_cpfs(&self.pool).await.map_err(store_err)?,
            cnpjs: OrganizationRepo::list_tax_ids(&self.pool)
                .await
                .map_err(store_err)?,
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await.map_err(store_err)
    }
}
