//! The four geographic levels (Country → State → City → Neighborhood) and
//! the input payloads that create or mutate them.
//!
//! Entities are the persisted row shapes. Inputs are what clients submit:
//! the same fields minus the audit block, with optional id and concurrency
//! token. `to_entity` builds a fresh row, `apply_to` copies submitted values
//! onto a loaded one (the caller's token included, so a stale client token
//! surfaces as a concurrency conflict at commit).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contracts::{CreateOrUpdateRequest, DeleteRequest};
use crate::entity::{AuditFields, AuditedEntity, ScopedEntity};
use crate::error::EntityKind;

// ── Entities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    #[serde(flatten)]
    pub audit: AuditFields,
    pub row_version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub country_id: Uuid,
    #[serde(flatten)]
    pub audit: AuditFields,
    pub row_version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub state_id: Uuid,
    #[serde(flatten)]
    pub audit: AuditFields,
    pub row_version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighborhood {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub city_id: Uuid,
    #[serde(flatten)]
    pub audit: AuditFields,
    pub row_version: i64,
}

impl AuditedEntity for Country {
    const KIND: EntityKind = EntityKind::Country;

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn audit(&self) -> &AuditFields {
        &self.audit
    }
    fn audit_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }
    fn row_version(&self) -> i64 {
        self.row_version
    }
    fn set_row_version(&mut self, version: i64) {
        self.row_version = version;
    }
}

impl ScopedEntity for Country {
    fn name(&self) -> &str {
        &self.name
    }
    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
    fn parent_id(&self) -> Option<Uuid> {
        None
    }
}

impl AuditedEntity for State {
    const KIND: EntityKind = EntityKind::State;

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn audit(&self) -> &AuditFields {
        &self.audit
    }
    fn audit_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }
    fn row_version(&self) -> i64 {
        self.row_version
    }
    fn set_row_version(&mut self, version: i64) {
        self.row_version = version;
    }
}

impl ScopedEntity for State {
    fn name(&self) -> &str {
        &self.name
    }
    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
    fn parent_id(&self) -> Option<Uuid> {
        Some(self.country_id)
    }
}

impl AuditedEntity for City {
    const KIND: EntityKind = EntityKind::City;

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn audit(&self) -> &AuditFields {
        &self.audit
    }
    fn audit_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }
    fn row_version(&self) -> i64 {
        self.row_version
    }
    fn set_row_version(&mut self, version: i64) {
        self.row_version = version;
    }
}

impl ScopedEntity for City {
    fn name(&self) -> &str {
        &self.name
    }
    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
    fn parent_id(&self) -> Option<Uuid> {
        Some(self.state_id)
    }
}

impl AuditedEntity for Neighborhood {
    const KIND: EntityKind = EntityKind::Neighborhood;

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn audit(&self) -> &AuditFields {
        &self.audit
    }
    fn audit_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }
    fn row_version(&self) -> i64 {
        self.row_version
    }
    fn set_row_version(&mut self, version: i64) {
        self.row_version = version;
    }
}

impl ScopedEntity for Neighborhood {
    fn name(&self) -> &str {
        &self.name
    }
    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
    fn parent_id(&self) -> Option<Uuid> {
        Some(self.city_id)
    }
}

// ── Inputs ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub row_version: Option<i64>,
}

impl CountryInput {
    pub fn id_or_nil(&self) -> Uuid {
        self.id.unwrap_or_else(Uuid::nil)
    }

    pub fn to_entity(&self) -> Country {
        Country {
            id: self.id_or_nil(),
            name: self.name.clone(),
            code: self.code.clone(),
            audit: AuditFields::default(),
            row_version: self.row_version.unwrap_or(1),
        }
    }

    pub fn apply_to(&self, entity: &mut Country) {
        entity.name = self.name.clone();
        entity.code = self.code.clone();
        if let Some(version) = self.row_version {
            entity.row_version = version;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub country_id: Uuid,
    #[serde(default)]
    pub row_version: Option<i64>,
}

impl StateInput {
    pub fn id_or_nil(&self) -> Uuid {
        self.id.unwrap_or_else(Uuid::nil)
    }

    pub fn to_entity(&self) -> State {
        State {
            id: self.id_or_nil(),
            name: self.name.clone(),
            code: self.code.clone(),
            country_id: self.country_id,
            audit: AuditFields::default(),
            row_version: self.row_version.unwrap_or(1),
        }
    }

    pub fn apply_to(&self, entity: &mut State) {
        entity.name = self.name.clone();
        entity.code = self.code.clone();
        entity.country_id = self.country_id;
        if let Some(version) = self.row_version {
            entity.row_version = version;
        }
    }
}

/// City payload. Carries the whole aggregate: the city fields plus the
/// neighborhood change set the synchronization engine diffs against
/// persisted children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state_id: Uuid,
    #[serde(default)]
    pub row_version: Option<i64>,
    #[serde(default)]
    pub changed_neighborhood_requests: Vec<CreateOrUpdateRequest<NeighborhoodInput>>,
    #[serde(default)]
    pub deleted_neighborhood_requests: Vec<DeleteRequest>,
}

impl CityInput {
    pub fn id_or_nil(&self) -> Uuid {
        self.id.unwrap_or_else(Uuid::nil)
    }

    pub fn to_entity(&self) -> City {
        City {
            id: self.id_or_nil(),
            name: self.name.clone(),
            code: self.code.clone(),
            state_id: self.state_id,
            audit: AuditFields::default(),
            row_version: self.row_version.unwrap_or(1),
        }
    }

    pub fn apply_to(&self, entity: &mut City) {
        entity.name = self.name.clone();
        entity.code = self.code.clone();
        entity.state_id = self.state_id;
        if let Some(version) = self.row_version {
            entity.row_version = version;
        }
    }
}

/// Neighborhood payload inside a City submission. Carries no parent field:
/// the aggregate binds it to the city being created or updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub row_version: Option<i64>,
}

impl NeighborhoodInput {
    pub fn id_or_nil(&self) -> Uuid {
        self.id.unwrap_or_else(Uuid::nil)
    }

    pub fn to_entity(&self, city_id: Uuid) -> Neighborhood {
        Neighborhood {
            id: self.id_or_nil(),
            name: self.name.clone(),
            code: self.code.clone(),
            city_id,
            audit: AuditFields::default(),
            row_version: self.row_version.unwrap_or(1),
        }
    }

    pub fn apply_to(&self, entity: &mut Neighborhood) {
        entity.name = self.name.clone();
        entity.code = self.code.clone();
        if let Some(version) = self.row_version {
            entity.row_version = version;
        }
    }
}
