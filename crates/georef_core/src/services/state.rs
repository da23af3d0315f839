//! State CRUD. Same flow as countries, with the duplicate-name rule
//! scoped to the owning country.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::contracts::{
    CreateOrUpdateRequest, DeleteRequest, EmptyResponse, EntityResponse, GetByIdRequest,
    KeyResponse, Validate,
};
use crate::error::{EntityKind, GeoRefError, Result};
use crate::geography::{State, StateInput};
use crate::permission::{Capability, PermissionGate};
use crate::ports::EntityStore;
use crate::query::QuerySpec;

pub struct StateService {
    states: Arc<dyn EntityStore<State>>,
    gate: Arc<PermissionGate>,
}

impl StateService {
    pub fn new(states: Arc<dyn EntityStore<State>>, gate: Arc<PermissionGate>) -> Self {
        Self { states, gate }
    }

    pub async fn get(
        &self,
        request: GetByIdRequest,
        ctx: &RequestContext,
    ) -> Result<EntityResponse<State>> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;

        let state = self
            .states
            .get_first(QuerySpec::new().id_eq(request.id), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::State))?;
        Ok(EntityResponse { entity: state })
    }

    pub async fn post(
        &self,
        request: CreateOrUpdateRequest<StateInput>,
        ctx: &RequestContext,
    ) -> Result<KeyResponse> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;
        self.ensure_unique_name(&request.entity, ctx).await?;

        let mut state = request.entity.to_entity();
        self.states.insert_and_save(&mut state, ctx).await?;
        Ok(KeyResponse { id: state.id })
    }

    pub async fn put(
        &self,
        request: CreateOrUpdateRequest<StateInput>,
        ctx: &RequestContext,
    ) -> Result<KeyResponse> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;
        self.ensure_unique_name(&request.entity, ctx).await?;

        let mut state = self
            .states
            .get_first(QuerySpec::new().id_eq(request.entity.id_or_nil()), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::State))?;
        request.entity.apply_to(&mut state);
        self.states.update_and_save(&mut state, ctx).await?;
        Ok(KeyResponse { id: state.id })
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

        let state = self
            .states
            .get_first(QuerySpec::new().id_eq(request.id), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::State))?;
        self.states.delete_and_save(&state, ctx).await?;
        Ok(EmptyResponse {})
    }

    /// Sibling states of the same country may not share a name. The check
    /// runs against the country named in the request, so a reparenting put
    /// is checked against its destination.
    async fn ensure_unique_name(&self, input: &StateInput, ctx: &RequestContext) -> Result<()> {
        let taken = QuerySpec::new()
            .parent_eq(input.country_id)
            .name_eq(input.name.as_str())
            .id_ne(input.id_or_nil());
        if self.states.has_any(taken, ctx).await? {
            return Err(GeoRefError::DuplicateName(EntityKind::State));
        }
        Ok(())
    }
}
