//! Read-only summary projections for the search screens.
//!
//! A summary is a denormalized view of one entity with the names of its
//! ancestors pulled in. It never feeds back into mutation and never
//! triggers audit stamping; the storage adapter builds it from joins, the
//! in-memory repository from lookups.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::ScopedEntity;
use crate::geography::{City, Country, State};

/// Links a projection to the entity it summarizes. Query specifications for
/// a summary are written against `Entity`'s fields.
pub trait SummaryShape: Clone + Send + Sync + 'static {
    type Entity: ScopedEntity;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySummary {
    pub id: Uuid,
    pub name: String,
}

impl SummaryShape for CountrySummary {
    type Entity = Country;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub id: Uuid,
    pub name: String,
    pub country_id: Uuid,
    pub country_name: String,
}

impl SummaryShape for StateSummary {
    type Entity = State;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitySummary {
    pub id: Uuid,
    pub name: String,
    pub state_id: Uuid,
    pub state_name: String,
    pub country_id: Uuid,
    pub country_name: String,
}

impl SummaryShape for CitySummary {
    type Entity = City;
}
