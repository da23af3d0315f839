//! Postgres repository session.
//!
//! One `PgRepository` per logical request. Writes are staged as boxed
//! closures and applied in staging order inside a single transaction at
//! `save`; an explicit transaction scope (`begin_transaction`) lets
//! several saves share one commit. Queries run on the open transaction
//! when there is one, so a session reads its own uncommitted writes.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use georef_core::context::RequestContext;
use georef_core::error::{EntityKind, GeoRefError, Result};
use georef_core::geography::{City, Country, State};
use georef_core::ports::{CurrentIdentity, EntityStore, SummaryStore, UnitOfWork};
use georef_core::query::QuerySpec;
use georef_core::summaries::{CitySummary, CountrySummary, StateSummary};

use crate::query::{push_conditions, push_limit, push_order, select_entity_sql};
use crate::rows::{
    PgCitySummaryRow, PgCountrySummaryRow, PgEntity, PgEntityRow, PgStateSummaryRow,
};

/// Maps driver errors onto the typed domain errors. Unique-index names are
/// the contract between the schema and this translation.
pub(crate) fn translate(err: sqlx::Error) -> GeoRefError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => {
                let kind = match db.constraint() {
                    Some("uq_countries_name") => Some(EntityKind::Country),
                    Some("uq_states_country_name") => Some(EntityKind::State),
                    Some("uq_cities_state_name") => Some(EntityKind::City),
                    Some("uq_neighborhoods_city_name") => Some(EntityKind::Neighborhood),
                    Some("uq_principals_email") => Some(EntityKind::Principal),
                    _ => None,
                };
                return match kind {
                    Some(kind) => GeoRefError::DuplicateName(kind),
                    None => GeoRefError::Integrity(db.message().to_string()),
                };
            }
            Some("23503") => return GeoRefError::Integrity(db.message().to_string()),
            _ => {}
        }
    }
    GeoRefError::Internal(anyhow!(err))
}

// ── Staged write SQL ─────────────────────────────────────────────

fn insert_sql<E: PgEntity>() -> String {
    match E::PARENT_COL {
        Some(parent) => format!(
            "INSERT INTO {table} (id, name, code, {parent}, created_at, created_by_id, \
             created_by_name, updated_at, updated_by_id, updated_by_name, row_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            table = E::TABLE
        ),
        None => format!(
            "INSERT INTO {table} (id, name, code, created_at, created_by_id, \
             created_by_name, updated_at, updated_by_id, updated_by_name, row_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            table = E::TABLE
        ),
    }
}

fn update_sql<E: PgEntity>() -> String {
    match E::PARENT_COL {
        Some(parent) => format!(
            "UPDATE {table} SET name = $1, code = $2, {parent} = $3, updated_at = $4, \
             updated_by_id = $5, updated_by_name = $6, row_version = row_version + 1 \
             WHERE id = $7 AND row_version = $8",
            table = E::TABLE
        ),
        None => format!(
            "UPDATE {table} SET name = $1, code = $2, updated_at = $3, \
             updated_by_id = $4, updated_by_name = $5, row_version = row_version + 1 \
             WHERE id = $6 AND row_version = $7",
            table = E::TABLE
        ),
    }
}

fn delete_sql<E: PgEntity>() -> String {
    format!(
        "DELETE FROM {table} WHERE id = $1 AND row_version = $2",
        table = E::TABLE
    )
}

type StagedWrite = Box<dyn for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<()>> + Send>;

fn stage_insert<E: PgEntity>(entity: &E) -> StagedWrite {
    let id = entity.id();
    let name = entity.name().to_owned();
    let code = entity.code().map(str::to_owned);
    let parent = entity.parent_id();
    let audit = entity.audit().clone();
    let row_version = entity.row_version();
    Box::new(move |conn| {
        Box::pin(async move {
            let sql = insert_sql::<E>();
            let mut query = sqlx::query(&sql).bind(id).bind(name).bind(code);
            if E::PARENT_COL.is_some() {
                query = query.bind(parent);
            }
            query
                .bind(audit.created_at)
                .bind(audit.created_by_id)
                .bind(audit.created_by_name)
                .bind(audit.updated_at)
                .bind(audit.updated_by_id)
                .bind(audit.updated_by_name)
                .bind(row_version)
                .execute(conn)
                .await
                .map_err(translate)?;
            Ok(())
        })
    })
}

fn stage_update<E: PgEntity>(entity: &E) -> StagedWrite {
    let id = entity.id();
    let name = entity.name().to_owned();
    let code = entity.code().map(str::to_owned);
    let parent = entity.parent_id();
    let audit = entity.audit().clone();
    let expected = entity.row_version();
    Box::new(move |conn| {
        Box::pin(async move {
            let sql = update_sql::<E>();
            let mut query = sqlx::query(&sql).bind(name).bind(code);
            if E::PARENT_COL.is_some() {
                query = query.bind(parent);
            }
            let result = query
                .bind(audit.updated_at)
                .bind(audit.updated_by_id)
                .bind(audit.updated_by_name)
                .bind(id)
                .bind(expected)
                .execute(conn)
                .await
                .map_err(translate)?;
            if result.rows_affected() == 0 {
                return Err(GeoRefError::Concurrency(format!(
                    "stale update on {} row",
                    E::KIND
                )));
            }
            Ok(())
        })
    })
}

fn stage_delete<E: PgEntity>(entity: &E) -> StagedWrite {
    let id = entity.id();
    let expected = entity.row_version();
    Box::new(move |conn| {
        Box::pin(async move {
            let sql = delete_sql::<E>();
            let result = sqlx::query(&sql)
                .bind(id)
                .bind(expected)
                .execute(conn)
                .await
                .map_err(translate)?;
            if result.rows_affected() == 0 {
                return Err(GeoRefError::Concurrency(format!(
                    "stale delete on {} row",
                    E::KIND
                )));
            }
            Ok(())
        })
    })
}

// ── Session ──────────────────────────────────────────────────────

#[derive(Default)]
struct SessionState {
    staged: Vec<StagedWrite>,
    tx: Option<Transaction<'static, Postgres>>,
}

pub struct PgRepository {
    pool: PgPool,
    identity: Arc<dyn CurrentIdentity>,
    state: Mutex<SessionState>,
}

impl PgRepository {
    pub fn new(pool: PgPool, identity: Arc<dyn CurrentIdentity>) -> Self {
        Self {
            pool,
            identity,
            state: Mutex::new(SessionState::default()),
        }
    }

    async fn fetch_rows<E: PgEntity>(
        &self,
        spec: &QuerySpec<E>,
        limit: Option<i64>,
    ) -> Result<Vec<PgEntityRow>> {
        let mut builder = QueryBuilder::new(select_entity_sql::<E>());
        push_conditions(&mut builder, spec);
        push_order(&mut builder, spec);
        push_limit(&mut builder, limit);

        let mut state = self.state.lock().await;
        let query = builder.build_query_as::<PgEntityRow>();
        let rows = match state.tx.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await,
            None => query.fetch_all(&self.pool).await,
        }
        .map_err(translate)?;
        Ok(rows)
    }

    async fn fetch_exists<E: PgEntity>(&self, spec: &QuerySpec<E>) -> Result<bool> {
        let mut builder =
            QueryBuilder::new(format!("SELECT EXISTS(SELECT 1 FROM {} t", E::TABLE));
        push_conditions(&mut builder, spec);
        builder.push(")");

        let mut state = self.state.lock().await;
        let query = builder.build_query_scalar::<bool>();
        let exists = match state.tx.as_mut() {
            Some(tx) => query.fetch_one(&mut **tx).await,
            None => query.fetch_one(&self.pool).await,
        }
        .map_err(translate)?;
        Ok(exists)
    }

    async fn fetch_summary_rows<E, R>(
        &self,
        select: &str,
        spec: &QuerySpec<E>,
        limit: Option<i64>,
    ) -> Result<Vec<R>>
    where
        E: PgEntity,
        R: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let mut builder = QueryBuilder::new(select);
        push_conditions(&mut builder, spec);
        push_order(&mut builder, spec);
        push_limit(&mut builder, limit);

        let mut state = self.state.lock().await;
        let query = builder.build_query_as::<R>();
        let rows = match state.tx.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await,
            None => query.fetch_all(&self.pool).await,
        }
        .map_err(translate)?;
        Ok(rows)
    }
}

#[async_trait]
impl<E: PgEntity> EntityStore<E> for PgRepository {
    async fn insert(&self, entity: &mut E, ctx: &RequestContext) -> Result<()> {
        let principal = self.identity.current(ctx).await?;
        if entity.id().is_nil() {
            entity.set_id(Uuid::new_v4());
        }
        entity.set_row_version(1);
        entity.stamp_created(Utc::now(), principal.id, &principal.name);
        self.state.lock().await.staged.push(stage_insert(entity));
        Ok(())
    }

    async fn update(&self, entity: &mut E, ctx: &RequestContext) -> Result<()> {
        let principal = self.identity.current(ctx).await?;
        entity.stamp_updated(Utc::now(), principal.id, &principal.name);
        self.state.lock().await.staged.push(stage_update(entity));
        Ok(())
    }

    async fn delete(&self, entity: &E, _ctx: &RequestContext) -> Result<()> {
        self.state.lock().await.staged.push(stage_delete(entity));
        Ok(())
    }

    async fn insert_and_save(&self, entity: &mut E, ctx: &RequestContext) -> Result<()> {
        EntityStore::insert(self, entity, ctx).await?;
        UnitOfWork::save(self, ctx).await
    }

    async fn update_and_save(&self, entity: &mut E, ctx: &RequestContext) -> Result<()> {
        EntityStore::update(self, entity, ctx).await?;
        UnitOfWork::save(self, ctx).await
    }

    async fn delete_and_save(&self, entity: &E, ctx: &RequestContext) -> Result<()> {
        EntityStore::delete(self, entity, ctx).await?;
        UnitOfWork::save(self, ctx).await
    }

    async fn get_all(&self, _ctx: &RequestContext) -> Result<Vec<E>> {
        let spec = QuerySpec::<E>::new();
        let rows = self.fetch_rows(&spec, None).await?;
        Ok(rows.into_iter().map(E::from_row).collect())
    }

    async fn get_by(&self, spec: QuerySpec<E>, _ctx: &RequestContext) -> Result<Vec<E>> {
        let rows = self.fetch_rows(&spec, spec.take).await?;
        Ok(rows.into_iter().map(E::from_row).collect())
    }

    async fn get_first(&self, spec: QuerySpec<E>, _ctx: &RequestContext) -> Result<Option<E>> {
        let limit = Some(spec.take.unwrap_or(1));
        let rows = self.fetch_rows(&spec, limit).await?;
        Ok(rows.into_iter().next().map(E::from_row))
    }

    async fn has_any(&self, spec: QuerySpec<E>, _ctx: &RequestContext) -> Result<bool> {
        self.fetch_exists(&spec).await
    }
}

#[async_trait]
impl UnitOfWork for PgRepository {
    async fn save(&self, _ctx: &RequestContext) -> Result<()> {
        let mut state = self.state.lock().await;
        let staged: Vec<StagedWrite> = state.staged.drain(..).collect();
        if staged.is_empty() {
            return Ok(());
        }
        debug!(writes = staged.len(), "committing staged batch");
        match state.tx.as_mut() {
            // Apply inside the open scope; commit happens later.
            Some(tx) => {
                for op in staged {
                    op(&mut **tx).await?;
                }
            }
            None => {
                let mut tx = self.pool.begin().await.map_err(translate)?;
                for op in staged {
                    op(&mut *tx).await?;
                }
                tx.commit().await.map_err(translate)?;
            }
        }
        Ok(())
    }

    async fn begin_transaction(&self, _ctx: &RequestContext) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.tx.is_some() {
            return Err(GeoRefError::Internal(anyhow!("transaction already open")));
        }
        state.tx = Some(self.pool.begin().await.map_err(translate)?);
        Ok(())
    }

    async fn commit_transaction(&self, _ctx: &RequestContext) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.tx.take() {
            Some(tx) => tx.commit().await.map_err(translate),
            None => Err(GeoRefError::Internal(anyhow!("no open transaction"))),
        }
    }

    async fn rollback_transaction(&self, _ctx: &RequestContext) -> Result<()> {
        let mut state = self.state.lock().await;
        state.staged.clear();
        match state.tx.take() {
            Some(tx) => tx.rollback().await.map_err(translate),
            None => Err(GeoRefError::Internal(anyhow!("no open transaction"))),
        }
    }
}

// ── Summaries ────────────────────────────────────────────────────

const COUNTRY_SUMMARY_SQL: &str = "SELECT t.id, t.name FROM countries t";

const STATE_SUMMARY_SQL: &str = "SELECT t.id, t.name, t.country_id, c.name AS country_name \
     FROM states t JOIN countries c ON c.id = t.country_id";

const CITY_SUMMARY_SQL: &str =
    "SELECT t.id, t.name, t.state_id, s.name AS state_name, c.id AS country_id, \
     c.name AS country_name \
     FROM cities t JOIN states s ON s.id = t.state_id \
     JOIN countries c ON c.id = s.country_id";

#[async_trait]
impl SummaryStore<CountrySummary> for PgRepository {
    async fn get_summaries(
        &self,
        spec: QuerySpec<Country>,
        _ctx: &RequestContext,
    ) -> Result<Vec<CountrySummary>> {
        let rows: Vec<PgCountrySummaryRow> = self
            .fetch_summary_rows(COUNTRY_SUMMARY_SQL, &spec, spec.take)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| CountrySummary {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    async fn get_summary_first(
        &self,
        spec: QuerySpec<Country>,
        _ctx: &RequestContext,
    ) -> Result<Option<CountrySummary>> {
        let limit = Some(spec.take.unwrap_or(1));
        let rows: Vec<PgCountrySummaryRow> = self
            .fetch_summary_rows(COUNTRY_SUMMARY_SQL, &spec, limit)
            .await?;
        Ok(rows.into_iter().next().map(|row| CountrySummary {
            id: row.id,
            name: row.name,
        }))
    }
}

#[async_trait]
impl SummaryStore<StateSummary> for PgRepository {
    async fn get_summaries(
        &self,
        spec: QuerySpec<State>,
        _ctx: &RequestContext,
    ) -> Result<Vec<StateSummary>> {
        let rows: Vec<PgStateSummaryRow> = self
            .fetch_summary_rows(STATE_SUMMARY_SQL, &spec, spec.take)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| StateSummary {
                id: row.id,
                name: row.name,
                country_id: row.country_id,
                country_name: row.country_name,
            })
            .collect())
    }

    async fn get_summary_first(
        &self,
        spec: QuerySpec<State>,
        _ctx: &RequestContext,
    ) -> Result<Option<StateSummary>> {
        let limit = Some(spec.take.unwrap_or(1));
        let rows: Vec<PgStateSummaryRow> = self
            .fetch_summary_rows(STATE_SUMMARY_SQL, &spec, limit)
            .await?;
        Ok(rows.into_iter().next().map(|row| StateSummary {
            id: row.id,
            name: row.name,
            country_id: row.country_id,
            country_name: row.country_name,
        }))
    }
}

#[async_trait]
impl SummaryStore<CitySummary> for PgRepository {
    async fn get_summaries(
        &self,
        spec: QuerySpec<City>,
        _ctx: &RequestContext,
    ) -> Result<Vec<CitySummary>> {
        let rows: Vec<PgCitySummaryRow> = self
            .fetch_summary_rows(CITY_SUMMARY_SQL, &spec, spec.take)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| CitySummary {
                id: row.id,
                name: row.name,
                state_id: row.state_id,
                state_name: row.state_name,
                country_id: row.country_id,
                country_name: row.country_name,
            })
            .collect())
    }

    async fn get_summary_first(
        &self,
        spec: QuerySpec<City>,
        _ctx: &RequestContext,
    ) -> Result<Option<CitySummary>> {
        let limit = Some(spec.take.unwrap_or(1));
        let rows: Vec<PgCitySummaryRow> = self
            .fetch_summary_rows(CITY_SUMMARY_SQL, &spec, limit)
            .await?;
        Ok(rows.into_iter().next().map(|row| CitySummary {
            id: row.id,
            name: row.name,
            state_id: row.state_id,
            state_name: row.state_name,
            country_id: row.country_id,
            country_name: row.country_name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georef_core::geography::Neighborhood;

    #[test]
    fn insert_sql_includes_the_parent_column_when_present() {
        let with_parent = insert_sql::<State>();
        assert!(with_parent.starts_with("INSERT INTO states "));
        assert!(with_parent.contains("country_id"));
        assert!(with_parent.contains("$11"));

        let without_parent = insert_sql::<Country>();
        assert!(!without_parent.contains("country_id"));
        assert!(without_parent.contains("$10"));
        assert!(!without_parent.contains("$11"));
    }

    #[test]
    fn update_sql_bumps_and_guards_on_the_token() {
        let sql = update_sql::<City>();
        assert!(sql.contains("row_version = row_version + 1"));
        assert!(sql.ends_with("WHERE id = $7 AND row_version = $8"));

        let root = update_sql::<Country>();
        assert!(root.ends_with("WHERE id = $6 AND row_version = $7"));
    }

    #[test]
    fn delete_sql_guards_on_the_token() {
        assert_eq!(
            delete_sql::<Neighborhood>(),
            "DELETE FROM neighborhoods WHERE id = $1 AND row_version = $2"
        );
    }

    #[test]
    fn unique_violations_map_to_the_entity_kind() {
        // Driver errors cannot be fabricated here; the mapping itself is
        // pinned by the integration tests. This covers the fallback.
        let err = translate(sqlx::Error::RowNotFound);
        assert!(matches!(err, GeoRefError::Internal(_)));
    }
}
