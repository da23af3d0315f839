//! In-memory implementations of the storage ports.
//!
//! `MemoryRepository` backs the service tests: it honors the full staged
//! write contract (stamping, token checks, scoped unique names, cascade
//! delete, atomic save) and counts every staged call so tests can assert
//! "no writes occurred". Nothing here touches a database, which also makes
//! it a working reference for what any adapter must do.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::entity::ScopedEntity;
use crate::error::{GeoRefError, Result};
use crate::geography::{
    City, CityInput, Country, CountryInput, Neighborhood, NeighborhoodInput, State, StateInput,
};
use crate::identity::{Principal, PrincipalRecord};
use crate::ports::{CurrentIdentity, EntityStore, PrincipalStore, SummaryStore, UnitOfWork};
use crate::query::QuerySpec;
use crate::summaries::{CitySummary, CountrySummary, StateSummary};

// ── Principals ───────────────────────────────────────────────────

pub fn system_principal() -> Principal {
    Principal {
        id: Uuid::from_u128(1),
        name: "System Admin".into(),
        email: "system@example.com".into(),
        is_system: true,
    }
}

pub fn principal(name: &str, email: &str) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        name: name.into(),
        email: email.into(),
        is_system: false,
    }
}

/// Identity source with fixed answers. Keeps service tests independent of
/// the resolver and its principal store.
pub struct StaticIdentity {
    current: Principal,
    system: Principal,
}

impl StaticIdentity {
    pub fn system_only() -> Self {
        let system = system_principal();
        Self {
            current: system.clone(),
            system,
        }
    }

    pub fn acting_as(current: Principal) -> Self {
        Self {
            current,
            system: system_principal(),
        }
    }
}

#[async_trait]
impl CurrentIdentity for StaticIdentity {
    async fn current(&self, _ctx: &RequestContext) -> Result<Principal> {
        Ok(self.current.clone())
    }

    async fn system(&self, _ctx: &RequestContext) -> Result<Principal> {
        Ok(self.system.clone())
    }
}

#[derive(Default)]
pub struct MemoryPrincipalStore {
    rows: Mutex<Vec<PrincipalRecord>>,
}

impl MemoryPrincipalStore {
    pub async fn principal_count(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn clear(&self) {
        self.rows.lock().await.clear();
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PrincipalRecord>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|record| record.email == email)
            .cloned())
    }

    async fn find_system(&self) -> Result<Option<PrincipalRecord>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|record| record.is_system)
            .cloned())
    }

    async fn insert(&self, record: &PrincipalRecord) -> Result<()> {
        self.rows.lock().await.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &PrincipalRecord) -> Result<()> {
        let mut rows = self.rows.lock().await;
        match rows.iter_mut().find(|row| row.id == record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(GeoRefError::Internal(anyhow::anyhow!(
                "principal {} not found",
                record.id
            ))),
        }
    }
}

// ── Repository ───────────────────────────────────────────────────

/// Staged-call counters, incremented at staging time (not at save), so a
/// validation failure provably staged nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub saves: usize,
}

#[derive(Default, Clone)]
pub struct Tables {
    pub countries: Vec<Country>,
    pub states: Vec<State>,
    pub cities: Vec<City>,
    pub neighborhoods: Vec<Neighborhood>,
}

/// Maps an entity type onto its table, plus the storage-level cascade that
/// runs when a row is deleted.
pub trait MemoryEntity: ScopedEntity {
    fn table(tables: &Tables) -> &Vec<Self>
    where
        Self: Sized;
    fn table_mut(tables: &mut Tables) -> &mut Vec<Self>
    where
        Self: Sized;
    fn cascade_delete(_tables: &mut Tables, _id: Uuid) {}
}

impl MemoryEntity for Country {
    fn table(tables: &Tables) -> &Vec<Self> {
        &tables.countries
    }
    fn table_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.countries
    }
    fn cascade_delete(tables: &mut Tables, id: Uuid) {
        let state_ids: Vec<Uuid> = tables
            .states
            .iter()
            .filter(|state| state.country_id == id)
            .map(|state| state.id)
            .collect();
        tables.states.retain(|state| state.country_id != id);
        for state_id in state_ids {
            State::cascade_delete(tables, state_id);
        }
    }
}

impl MemoryEntity for State {
    fn table(tables: &Tables) -> &Vec<Self> {
        &tables.states
    }
    fn table_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.states
    }
    fn cascade_delete(tables: &mut Tables, id: Uuid) {
        let city_ids: Vec<Uuid> = tables
            .cities
            .iter()
            .filter(|city| city.state_id == id)
            .map(|city| city.id)
            .collect();
        tables.cities.retain(|city| city.state_id != id);
        for city_id in city_ids {
            City::cascade_delete(tables, city_id);
        }
    }
}

impl MemoryEntity for City {
    fn table(tables: &Tables) -> &Vec<Self> {
        &tables.cities
    }
    fn table_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.cities
    }
    fn cascade_delete(tables: &mut Tables, id: Uuid) {
        tables.neighborhoods.retain(|neighborhood| neighborhood.city_id != id);
    }
}

impl MemoryEntity for Neighborhood {
    fn table(tables: &Tables) -> &Vec<Self> {
        &tables.neighborhoods
    }
    fn table_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.neighborhoods
    }
}

type StagedOp = Box<dyn FnOnce(&mut Tables) -> Result<()> + Send>;

#[derive(Default)]
struct RepoState {
    tables: Tables,
    staged: Vec<StagedOp>,
    counts: WriteCounts,
    tx_backup: Option<Tables>,
}

pub struct MemoryRepository {
    identity: Arc<dyn CurrentIdentity>,
    state: Mutex<RepoState>,
}

impl MemoryRepository {
    pub fn new(identity: Arc<dyn CurrentIdentity>) -> Self {
        Self {
            identity,
            state: Mutex::new(RepoState::default()),
        }
    }

    pub fn with_system_identity() -> Self {
        Self::new(Arc::new(StaticIdentity::system_only()))
    }

    pub async fn write_counts(&self) -> WriteCounts {
        self.state.lock().await.counts
    }

    pub async fn rows<E: MemoryEntity>(&self) -> Vec<E> {
        E::table(&self.state.lock().await.tables).clone()
    }

    // Seeds commit directly, bypassing staging and the counters, so tests
    // can arrange state without disturbing "zero writes" assertions.

    pub async fn seed_country(&self, name: &str) -> Country {
        let mut entity = CountryInput {
            name: name.into(),
            ..Default::default()
        }
        .to_entity();
        entity.id = Uuid::new_v4();
        self.state.lock().await.tables.countries.push(entity.clone());
        entity
    }

    pub async fn seed_state(&self, name: &str, country_id: Uuid) -> State {
        let mut entity = StateInput {
            name: name.into(),
            country_id,
            ..Default::default()
        }
        .to_entity();
        entity.id = Uuid::new_v4();
        self.state.lock().await.tables.states.push(entity.clone());
        entity
    }

    pub async fn seed_city(&self, name: &str, state_id: Uuid) -> City {
        let mut entity = CityInput {
            name: name.into(),
            state_id,
            ..Default::default()
        }
        .to_entity();
        entity.id = Uuid::new_v4();
        self.state.lock().await.tables.cities.push(entity.clone());
        entity
    }

    pub async fn seed_neighborhood(&self, name: &str, city_id: Uuid) -> Neighborhood {
        let mut entity = NeighborhoodInput {
            name: name.into(),
            ..Default::default()
        }
        .to_entity(city_id);
        entity.id = Uuid::new_v4();
        self.state
            .lock()
            .await
            .tables
            .neighborhoods
            .push(entity.clone());
        entity
    }
}

fn sibling_name_taken<E: MemoryEntity>(table: &[E], row: &E) -> bool {
    table.iter().any(|other| {
        other.parent_id() == row.parent_id() && other.name() == row.name() && other.id() != row.id()
    })
}

#[async_trait]
impl<E: MemoryEntity> EntityStore<E> for MemoryRepository {
    async fn insert(&self, entity: &mut E, ctx: &RequestContext) -> Result<()> {
        let principal = self.identity.current(ctx).await?;
        if entity.id().is_nil() {
            entity.set_id(Uuid::new_v4());
        }
        entity.set_row_version(1);
        entity.stamp_created(Utc::now(), principal.id, &principal.name);

        let row = entity.clone();
        let mut state = self.state.lock().await;
        state.counts.inserts += 1;
        state.staged.push(Box::new(move |tables| {
            let table = E::table_mut(tables);
            if sibling_name_taken(table, &row) {
                return Err(GeoRefError::DuplicateName(E::KIND));
            }
            table.push(row);
            Ok(())
        }));
        Ok(())
    }

    async fn update(&self, entity: &mut E, ctx: &RequestContext) -> Result<()> {
        let principal = self.identity.current(ctx).await?;
        entity.stamp_updated(Utc::now(), principal.id, &principal.name);

        let expected = entity.row_version();
        let row = entity.clone();
        let mut state = self.state.lock().await;
        state.counts.updates += 1;
        state.staged.push(Box::new(move |tables| {
            let table = E::table_mut(tables);
            // A stale token wins over a name collision, as it would under
            // `UPDATE .. WHERE id = $1 AND row_version = $2`.
            let duplicate = sibling_name_taken(table, &row);
            match table.iter_mut().find(|other| other.id() == row.id()) {
                Some(slot) if slot.row_version() == expected => {
                    if duplicate {
                        return Err(GeoRefError::DuplicateName(E::KIND));
                    }
                    let mut next = row;
                    next.set_row_version(expected + 1);
                    *slot = next;
                    Ok(())
                }
                _ => Err(GeoRefError::Concurrency(format!(
                    "stale update on {} row",
                    E::KIND
                ))),
            }
        }));
        Ok(())
    }

    async fn delete(&self, entity: &E, _ctx: &RequestContext) -> Result<()> {
        let id = entity.id();
        let expected = entity.row_version();
        let mut state = self.state.lock().await;
        state.counts.deletes += 1;
        state.staged.push(Box::new(move |tables| {
            let position = E::table_mut(tables)
                .iter()
                .position(|other| other.id() == id && other.row_version() == expected);
            match position {
                Some(index) => {
                    E::table_mut(tables).remove(index);
                    E::cascade_delete(tables, id);
                    Ok(())
                }
                None => Err(GeoRefError::Concurrency(format!(
                    "stale delete on {} row",
                    E::KIND
                ))),
            }
        }));
        Ok(())
    }

    async fn insert_and_save(&self, entity: &mut E, ctx: &RequestContext) -> Result<()> {
        self.insert(entity, ctx).await?;
        UnitOfWork::save(self, ctx).await
    }

    async fn update_and_save(&self, entity: &mut E, ctx: &RequestContext) -> Result<()> {
        self.update(entity, ctx).await?;
        UnitOfWork::save(self, ctx).await
    }

    async fn delete_and_save(&self, entity: &E, ctx: &RequestContext) -> Result<()> {
        self.delete(entity, ctx).await?;
        UnitOfWork::save(self, ctx).await
    }

    async fn get_all(&self, _ctx: &RequestContext) -> Result<Vec<E>> {
        Ok(E::table(&self.state.lock().await.tables).clone())
    }

    async fn get_by(&self, spec: QuerySpec<E>, _ctx: &RequestContext) -> Result<Vec<E>> {
        Ok(spec.evaluate(E::table(&self.state.lock().await.tables)))
    }

    async fn get_first(&self, spec: QuerySpec<E>, _ctx: &RequestContext) -> Result<Option<E>> {
        Ok(spec
            .evaluate(E::table(&self.state.lock().await.tables))
            .into_iter()
            .next())
    }

    async fn has_any(&self, spec: QuerySpec<E>, _ctx: &RequestContext) -> Result<bool> {
        Ok(E::table(&self.state.lock().await.tables)
            .iter()
            .any(|row| spec.matches(row)))
    }
}

#[async_trait]
impl UnitOfWork for MemoryRepository {
    async fn save(&self, _ctx: &RequestContext) -> Result<()> {
        let mut state = self.state.lock().await;
        state.counts.saves += 1;
        let staged: Vec<StagedOp> = state.staged.drain(..).collect();

        // Apply against a working copy; swap in only when the whole batch
        // lands, so a failure mid-batch leaves nothing behind.
        let mut working = state.tables.clone();
        for op in staged {
            op(&mut working)?;
        }
        state.tables = working;
        Ok(())
    }

    async fn begin_transaction(&self, _ctx: &RequestContext) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.tx_backup.is_some() {
            return Err(GeoRefError::Internal(anyhow::anyhow!(
                "transaction already open"
            )));
        }
        state.tx_backup = Some(state.tables.clone());
        Ok(())
    }

    async fn commit_transaction(&self, _ctx: &RequestContext) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.tx_backup.take().is_none() {
            return Err(GeoRefError::Internal(anyhow::anyhow!("no open transaction")));
        }
        Ok(())
    }

    async fn rollback_transaction(&self, _ctx: &RequestContext) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.tx_backup.take() {
            Some(backup) => {
                state.tables = backup;
                state.staged.clear();
                Ok(())
            }
            None => Err(GeoRefError::Internal(anyhow::anyhow!("no open transaction"))),
        }
    }
}

#[async_trait]
impl SummaryStore<CountrySummary> for MemoryRepository {
    async fn get_summaries(
        &self,
        spec: QuerySpec<Country>,
        _ctx: &RequestContext,
    ) -> Result<Vec<CountrySummary>> {
        let state = self.state.lock().await;
        Ok(spec
            .evaluate(&state.tables.countries)
            .into_iter()
            .map(|country| CountrySummary {
                id: country.id,
                name: country.name,
            })
            .collect())
    }

    async fn get_summary_first(
        &self,
        spec: QuerySpec<Country>,
        ctx: &RequestContext,
    ) -> Result<Option<CountrySummary>> {
        Ok(self.get_summaries(spec, ctx).await?.into_iter().next())
    }
}

#[async_trait]
impl SummaryStore<StateSummary> for MemoryRepository {
    async fn get_summaries(
        &self,
        spec: QuerySpec<State>,
        _ctx: &RequestContext,
    ) -> Result<Vec<StateSummary>> {
        let state = self.state.lock().await;
        Ok(spec
            .evaluate(&state.tables.states)
            .into_iter()
            .filter_map(|row| {
                let country = state
                    .tables
                    .countries
                    .iter()
                    .find(|country| country.id == row.country_id)?;
                Some(StateSummary {
                    id: row.id,
                    name: row.name,
                    country_id: country.id,
                    country_name: country.name.clone(),
                })
            })
            .collect())
    }

    async fn get_summary_first(
        &self,
        spec: QuerySpec<State>,
        ctx: &RequestContext,
    ) -> Result<Option<StateSummary>> {
        Ok(self.get_summaries(spec, ctx).await?.into_iter().next())
    }
}

#[async_trait]
impl SummaryStore<CitySummary> for MemoryRepository {
    async fn get_summaries(
        &self,
        spec: QuerySpec<City>,
        _ctx: &RequestContext,
    ) -> Result<Vec<CitySummary>> {
        let state = self.state.lock().await;
        Ok(spec
            .evaluate(&state.tables.cities)
            .into_iter()
            .filter_map(|row| {
                let parent_state = state
                    .tables
                    .states
                    .iter()
                    .find(|parent| parent.id == row.state_id)?;
                let country = state
                    .tables
                    .countries
                    .iter()
                    .find(|country| country.id == parent_state.country_id)?;
                Some(CitySummary {
                    id: row.id,
                    name: row.name,
                    state_id: parent_state.id,
                    state_name: parent_state.name.clone(),
                    country_id: country.id,
                    country_name: country.name.clone(),
                })
            })
            .collect())
    }

    async fn get_summary_first(
        &self,
        spec: QuerySpec<City>,
        ctx: &RequestContext,
    ) -> Result<Option<CitySummary>> {
        Ok(self.get_summaries(spec, ctx).await?.into_iter().next())
    }
}
