//! Principal rows. These bypass the staged session entirely: identity
//! resolution and startup provisioning write immediately, with the audit
//! block already set by the caller.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use georef_core::error::{EntityKind, GeoRefError, Result};
use georef_core::identity::PrincipalRecord;
use georef_core::ports::PrincipalStore;

use crate::rows::PgPrincipalRow;
use crate::session::translate;

const SELECT_PRINCIPAL: &str = "SELECT id, name, email, is_system, created_at, created_by_id, \
     created_by_name, updated_at, updated_by_id, updated_by_name, row_version \
     FROM principals";

pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>> {
        let row = sqlx::query_as::<_, PgPrincipalRow>(&format!(
            "{SELECT_PRINCIPAL} WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(translate)?;
        Ok(row.map(Into::into))
    }

    async fn find_system(&self) -> Result<Option<PrincipalRecord>> {
        let row = sqlx::query_as::<_, PgPrincipalRow>(&format!(
            "{SELECT_PRINCIPAL} WHERE is_system LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(translate)?;
        Ok(row.map(Into::into))
    }

    async fn insert(&self, record: &PrincipalRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO principals (id, name, email, is_system, created_at, created_by_id, \
             created_by_name, updated_at, updated_by_id, updated_by_name, row_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.email)
        .bind(record.is_system)
        .bind(record.audit.created_at)
        .bind(record.audit.created_by_id)
        .bind(&record.audit.created_by_name)
        .bind(record.audit.updated_at)
        .bind(record.audit.updated_by_id)
        .bind(&record.audit.updated_by_name)
        .bind(record.row_version)
        .execute(&self.pool)
        .await
        .map_err(translate)?;
        Ok(())
    }

    async fn update(&self, record: &PrincipalRecord) -> Result<()> {
        let result = sqlx::query(
            "UPDATE principals SET name = $1, email = $2, updated_at = $3, \
             updated_by_id = $4, updated_by_name = $5, row_version = row_version + 1 \
             WHERE id = $6",
        )
        .bind(&record.name)
        .bind(&record.email)
        .bind(record.audit.updated_at)
        .bind(record.audit.updated_by_id)
        .bind(&record.audit.updated_by_name)
        .bind(record.id)
        .execute(&self.pool)
        .await
        .map_err(translate)?;
        if result.rows_affected() == 0 {
            return Err(GeoRefError::Internal(anyhow!(
                "{} not found for update",
                EntityKind::Principal
            )));
        }
        Ok(())
    }
}
