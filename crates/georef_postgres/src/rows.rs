//! Row mirrors and the table mapping for the four geographic levels.
//!
//! All SQL is runtime-checked (`sqlx::query_as`, not the macros) so the
//! crate builds without a database. One shared row shape covers every
//! entity table: the parent column is aliased to `parent_id` in the select
//! list, `NULL::uuid` for the parentless countries table.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use georef_core::entity::{AuditFields, ScopedEntity};
use georef_core::geography::{City, Country, Neighborhood, State};
use georef_core::identity::PrincipalRecord;

#[derive(Debug, FromRow)]
pub struct PgEntityRow {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub created_by_id: Uuid,
    pub created_by_name: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by_id: Option<Uuid>,
    pub updated_by_name: Option<String>,
    pub row_version: i64,
}

impl PgEntityRow {
    fn audit(&self) -> AuditFields {
        AuditFields {
            created_at: self.created_at,
            created_by_id: self.created_by_id,
            created_by_name: self.created_by_name.clone(),
            updated_at: self.updated_at,
            updated_by_id: self.updated_by_id,
            updated_by_name: self.updated_by_name.clone(),
        }
    }
}

/// Binds an entity type to its table and parent column.
pub trait PgEntity: ScopedEntity {
    const TABLE: &'static str;
    const PARENT_COL: Option<&'static str>;

    fn from_row(row: PgEntityRow) -> Self;
}

impl PgEntity for Country {
    const TABLE: &'static str = "countries";
    const PARENT_COL: Option<&'static str> = None;

    fn from_row(row: PgEntityRow) -> Self {
        let audit = row.audit();
        Country {
            id: row.id,
            name: row.name,
            code: row.code,
            row_version: row.row_version,
            audit,
        }
    }
}

impl PgEntity for State {
    const TABLE: &'static str = "states";
    const PARENT_COL: Option<&'static str> = Some("country_id");

    fn from_row(row: PgEntityRow) -> Self {
        let audit = row.audit();
        State {
            id: row.id,
            name: row.name,
            code: row.code,
            country_id: row.parent_id.unwrap_or_default(),
            row_version: row.row_version,
            audit,
        }
    }
}

impl PgEntity for City {
    const TABLE: &'static str = "cities";
    const PARENT_COL: Option<&'static str> = Some("state_id");

    fn from_row(row: PgEntityRow) -> Self {
        let audit = row.audit();
        City {
            id: row.id,
            name: row.name,
            code: row.code,
            state_id: row.parent_id.unwrap_or_default(),
            row_version: row.row_version,
            audit,
        }
    }
}

impl PgEntity for Neighborhood {
    const TABLE: &'static str = "neighborhoods";
    const PARENT_COL: Option<&'static str> = Some("city_id");

    fn from_row(row: PgEntityRow) -> Self {
        let audit = row.audit();
        Neighborhood {
            id: row.id,
            name: row.name,
            code: row.code,
            city_id: row.parent_id.unwrap_or_default(),
            row_version: row.row_version,
            audit,
        }
    }
}

// ── Summary rows ─────────────────────────────────────────────────

#[derive(Debug, FromRow)]
pub struct PgCountrySummaryRow {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, FromRow)]
pub struct PgStateSummaryRow {
    pub id: Uuid,
    pub name: String,
    pub country_id: Uuid,
    pub country_name: String,
}

#[derive(Debug, FromRow)]
pub struct PgCitySummaryRow {
    pub id: Uuid,
    pub name: String,
    pub state_id: Uuid,
    pub state_name: String,
    pub country_id: Uuid,
    pub country_name: String,
}

// ── Principal rows ───────────────────────────────────────────────

#[derive(Debug, FromRow)]
pub struct PgPrincipalRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub created_by_id: Uuid,
    pub created_by_name: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by_id: Option<Uuid>,
    pub updated_by_name: Option<String>,
    pub row_version: i64,
}

impl From<PgPrincipalRow> for PrincipalRecord {
    fn from(row: PgPrincipalRow) -> Self {
        PrincipalRecord {
            id: row.id,
            name: row.name,
            email: row.email,
            is_system: row.is_system,
            audit: AuditFields {
                created_at: row.created_at,
                created_by_id: row.created_by_id,
                created_by_name: row.created_by_name,
                updated_at: row.updated_at,
                updated_by_id: row.updated_by_id,
                updated_by_name: row.updated_by_name,
            },
            row_version: row.row_version,
        }
    }
}
