//! georef_postgres: Postgres implementations of the georef_core ports.
//!
//! One `PgRepository` session per logical request (staged writes, one
//! transactional save), plus the immediate-write `PgPrincipalStore` and
//! the idempotent schema bootstrap. All SQL is runtime-checked so the
//! crate builds without a database.

pub mod principals;
pub mod query;
pub mod rows;
pub mod session;

pub use principals::PgPrincipalStore;
pub use rows::{PgEntity, PgEntityRow};
pub use session::PgRepository;

use anyhow::anyhow;
use sqlx::PgPool;
use tracing::info;

use georef_core::error::{GeoRefError, Result};

pub const SCHEMA_SQL: &str = include_str!("../migrations/001_init.sql");

/// Applies the schema. Every statement is `IF NOT EXISTS`, so this is safe
/// to run on every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .map_err(|e| GeoRefError::Internal(anyhow!(e)))?;
    info!("geographic reference schema ensured");
    Ok(())
}
