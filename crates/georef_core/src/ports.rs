//! Port traits the storage adapters implement.
//!
//! The write side is staged: `insert`/`update`/`delete` only record intent
//! (after audit stamping) and nothing reaches storage until `save` commits
//! the whole batch atomically. The `*_and_save` forms stage and commit in
//! one call. Queries are side-effect-free and never stamp.

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::entity::ScopedEntity;
use crate::error::Result;
use crate::geography::{City, Country, Neighborhood, State};
use crate::identity::{Principal, PrincipalRecord};
use crate::query::QuerySpec;
use crate::summaries::{CitySummary, CountrySummary, StateSummary, SummaryShape};

/// Generic persistence gateway over one entity type.
///
/// Implementations stamp audit fields at staging time using the current
/// principal resolved from `ctx`, and translate storage-level conflicts
/// into the typed errors (`Concurrency`, `DuplicateName`) at save time.
#[async_trait]
pub trait EntityStore<E: ScopedEntity>: Send + Sync {
    // ── Staged writes ────────────────────────────────────────────

    /// Stamps creation and update fields, assigns a fresh id when the
    /// entity carries the nil id, and stages the row. Does not commit.
    async fn insert(&self, entity: &mut E, ctx: &RequestContext) -> Result<()>;

    /// Stamps update fields and stages the row, keyed on its current
    /// concurrency token. Does not commit.
    async fn update(&self, entity: &mut E, ctx: &RequestContext) -> Result<()>;

    /// Stages removal keyed on id and concurrency token. Does not commit.
    async fn delete(&self, entity: &E, ctx: &RequestContext) -> Result<()>;

    // ── Stage-and-commit conveniences ────────────────────────────

    async fn insert_and_save(&self, entity: &mut E, ctx: &RequestContext) -> Result<()>;
    async fn update_and_save(&self, entity: &mut E, ctx: &RequestContext) -> Result<()>;
    async fn delete_and_save(&self, entity: &E, ctx: &RequestContext) -> Result<()>;

    // ── Queries ──────────────────────────────────────────────────

    async fn get_all(&self, ctx: &RequestContext) -> Result<Vec<E>>;
    async fn get_by(&self, spec: QuerySpec<E>, ctx: &RequestContext) -> Result<Vec<E>>;
    async fn get_first(&self, spec: QuerySpec<E>, ctx: &RequestContext) -> Result<Option<E>>;
    async fn has_any(&self, spec: QuerySpec<E>, ctx: &RequestContext) -> Result<bool>;
}

/// Projected-summary queries. The spec is written against the summarized
/// entity's fields; the adapter joins parent names in.
#[async_trait]
pub trait SummaryStore<S: SummaryShape>: Send + Sync {
    async fn get_summaries(
        &self,
        spec: QuerySpec<S::Entity>,
        ctx: &RequestContext,
    ) -> Result<Vec<S>>;

    async fn get_summary_first(
        &self,
        spec: QuerySpec<S::Entity>,
        ctx: &RequestContext,
    ) -> Result<Option<S>>;
}

/// Commit scope shared by every `EntityStore` view of one session.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Commits all staged changes atomically, in staging order. A stale
    /// concurrency token anywhere in the batch fails the whole call with
    /// `Concurrency` and leaves storage unchanged.
    async fn save(&self, ctx: &RequestContext) -> Result<()>;

    /// Opens an explicit transaction scope. While open, `save` applies
    /// staged changes inside it without committing; the commit happens in
    /// `commit_transaction`. Dropping the session with an open scope rolls
    /// back.
    async fn begin_transaction(&self, ctx: &RequestContext) -> Result<()>;
    async fn commit_transaction(&self, ctx: &RequestContext) -> Result<()>;
    async fn rollback_transaction(&self, ctx: &RequestContext) -> Result<()>;
}

/// Principal rows bypass staging: identity resolution and startup
/// provisioning write immediately, with audit fields set by the caller.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>>;
    async fn find_system(&self) -> Result<Option<PrincipalRecord>>;
    async fn insert(&self, record: &PrincipalRecord) -> Result<()>;
    async fn update(&self, record: &PrincipalRecord) -> Result<()>;
}

/// Acting-principal resolution, consumed by the repository for stamping
/// and by the permission gate.
#[async_trait]
pub trait CurrentIdentity: Send + Sync {
    async fn current(&self, ctx: &RequestContext) -> Result<Principal>;
    async fn system(&self, ctx: &RequestContext) -> Result<Principal>;
}

/// Everything one repository session provides. Blanket-implemented, so any
/// type covering the four entity stores, the three summary stores, and the
/// unit of work qualifies.
pub trait GeoRepository:
    EntityStore<Country>
    + EntityStore<State>
    + EntityStore<City>
    + EntityStore<Neighborhood>
    + SummaryStore<CountrySummary>
    + SummaryStore<StateSummary>
    + SummaryStore<CitySummary>
    + UnitOfWork
    + 'static
{
}

impl<T> GeoRepository for T where
    T: EntityStore<Country>
        + EntityStore<State>
        + EntityStore<City>
        + EntityStore<Neighborhood>
        + SummaryStore<CountrySummary>
        + SummaryStore<StateSummary>
        + SummaryStore<CitySummary>
        + UnitOfWork
        + 'static
{
}
