//! City CRUD plus the neighborhood aggregate.
//!
//! A city request carries its neighborhood changes inline: rows to create
//! or update in `changed_neighborhood_requests`, rows to remove in
//! `deleted_neighborhood_requests`. The whole submission is validated up
//! front and committed through a single save, so a rejected aggregate
//! stages nothing.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::contracts::{
    CreateOrUpdateRequest, DeleteRequest, EmptyResponse, EntitiesResponse, EntityResponse,
    GetByIdRequest, GetByParentIdRequest, KeyResponse, Validate,
};
use crate::error::{EntityKind, GeoRefError, Result};
use crate::geography::{City, CityInput, Neighborhood};
use crate::permission::{Capability, PermissionGate};
use crate::ports::{EntityStore, UnitOfWork};
use crate::query::QuerySpec;

pub struct CityService {
    cities: Arc<dyn EntityStore<City>>,
    neighborhoods: Arc<dyn EntityStore<Neighborhood>>,
    uow: Arc<dyn UnitOfWork>,
    gate: Arc<PermissionGate>,
}

impl CityService {
    pub fn new(
        cities: Arc<dyn EntityStore<City>>,
        neighborhoods: Arc<dyn EntityStore<Neighborhood>>,
        uow: Arc<dyn UnitOfWork>,
        gate: Arc<PermissionGate>,
    ) -> Self {
        Self {
            cities,
            neighborhoods,
            uow,
            gate,
        }
    }

    pub async fn get(
        &self,
        request: GetByIdRequest,
        ctx: &RequestContext,
    ) -> Result<EntityResponse<City>> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;

        let city = self
            .cities
            .get_first(QuerySpec::new().id_eq(request.id), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::City))?;
        Ok(EntityResponse { entity: city })
    }

    pub async fn get_neighborhoods(
        &self,
        request: GetByParentIdRequest,
        ctx: &RequestContext,
    ) -> Result<EntitiesResponse<Neighborhood>> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;

        let rows = self
            .neighborhoods
            .get_by(QuerySpec::new().parent_eq(request.parent_id), ctx)
            .await?;
        Ok(EntitiesResponse { entities: rows })
    }

    pub async fn post(
        &self,
        request: CreateOrUpdateRequest<CityInput>,
        ctx: &RequestContext,
    ) -> Result<KeyResponse> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;
        self.validate_city(&request.entity, ctx).await?;

        let input = request.entity;
        let mut city = input.to_entity();
        self.cities.insert(&mut city, ctx).await?;

        for changed in &input.changed_neighborhood_requests {
            let mut neighborhood = changed.entity.to_entity(city.id);
            self.neighborhoods.insert(&mut neighborhood, ctx).await?;
        }

        self.uow.save(ctx).await?;
        debug!(
            city_id = %city.id,
            neighborhoods = input.changed_neighborhood_requests.len(),
            "city aggregate created"
        );
        Ok(KeyResponse { id: city.id })
    }

    pub async fn put(
        &self,
        request: CreateOrUpdateRequest<CityInput>,
        ctx: &RequestContext,
    ) -> Result<KeyResponse> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;
        self.validate_city(&request.entity, ctx).await?;

        let input = request.entity;
        let mut city = self
            .cities
            .get_first(QuerySpec::new().id_eq(input.id_or_nil()), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::City))?;
        input.apply_to(&mut city);
        self.cities.update(&mut city, ctx).await?;

        for changed in &input.changed_neighborhood_requests {
            let existing = match changed.entity.id {
                Some(id) if !id.is_nil() => {
                    self.neighborhoods
                        .get_first(QuerySpec::new().id_eq(id), ctx)
                        .await?
                }
                _ => None,
            };
            match existing {
                Some(mut row) => {
                    changed.entity.apply_to(&mut row);
                    self.neighborhoods.update(&mut row, ctx).await?;
                }
                None => {
                    let mut row = changed.entity.to_entity(city.id);
                    self.neighborhoods.insert(&mut row, ctx).await?;
                }
            }
        }

        // Unknown deleted ids are skipped; the row is already gone.
        for deleted in &input.deleted_neighborhood_requests {
            if let Some(row) = self
                .neighborhoods
                .get_first(QuerySpec::new().id_eq(deleted.id), ctx)
                .await?
            {
                self.neighborhoods.delete(&row, ctx).await?;
            }
        }

        self.uow.save(ctx).await?;
        debug!(
            city_id = %city.id,
            changed = input.changed_neighborhood_requests.len(),
            deleted = input.deleted_neighborhood_requests.len(),
            "city aggregate saved"
        );
        Ok(KeyResponse { id: city.id })
    }

    pub async fn delete(
        &self,
        request: DeleteRequest,
        ctx: &RequestContext,
    ) -> Result<EmptyResponse> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;

        let city = self
            .cities
            .get_first(QuerySpec::new().id_eq(request.id), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::City))?;
        // One delete; the store cascades to the neighborhoods.
        self.cities.delete_and_save(&city, ctx).await?;
        Ok(EmptyResponse {})
    }

    /// Aggregate validation, in order: referenced neighborhoods must belong
    /// to this city, the city name must be free among its state siblings,
    /// submitted neighborhood names must not collide with persisted rows
    /// that are not themselves being changed, and the submission must not
    /// repeat a name internally.
    async fn validate_city(&self, input: &CityInput, ctx: &RequestContext) -> Result<()> {
        let target = input.id_or_nil();

        let mut referenced: BTreeSet<Uuid> = input
            .changed_neighborhood_requests
            .iter()
            .filter_map(|request| request.entity.id)
            .filter(|id| !id.is_nil())
            .collect();
        referenced.extend(
            input
                .deleted_neighborhood_requests
                .iter()
                .map(|request| request.id),
        );

        if !referenced.is_empty() {
            let rows = self
                .neighborhoods
                .get_by(
                    QuerySpec::new().id_in(referenced.into_iter().collect()),
                    ctx,
                )
                .await?;
            if rows.iter().any(|row| row.city_id != target) {
                return Err(GeoRefError::Integrity(
                    "a referenced neighborhood belongs to a different city".into(),
                ));
            }
        }

        let sibling_taken = QuerySpec::new()
            .parent_eq(input.state_id)
            .name_eq(input.name.as_str())
            .id_ne(target);
        if self.cities.has_any(sibling_taken, ctx).await? {
            return Err(GeoRefError::DuplicateName(EntityKind::City));
        }

        let submitted: Vec<String> = input
            .changed_neighborhood_requests
            .iter()
            .map(|request| request.entity.name.clone())
            .collect();
        let kept: Vec<Uuid> = input
            .changed_neighborhood_requests
            .iter()
            .filter_map(|request| request.entity.id)
            .filter(|id| !id.is_nil())
            .collect();

        let collides = QuerySpec::new()
            .parent_eq(target)
            .name_in(submitted.clone())
            .id_not_in(kept);
        if self.neighborhoods.has_any(collides, ctx).await? {
            return Err(GeoRefError::DuplicateName(EntityKind::Neighborhood));
        }

        let mut seen = BTreeSet::new();
        for name in &submitted {
            if !seen.insert(name.as_str()) {
                return Err(GeoRefError::DuplicateName(EntityKind::Neighborhood));
            }
        }
        Ok(())
    }
}
