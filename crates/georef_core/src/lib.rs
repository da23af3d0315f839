//! georef_core: domain model and services for the geographic reference
//! backend, with NO database dependencies:
//! - Entity types for the Country → State → City → Neighborhood chain,
//!   with shared audit fields and an optimistic concurrency token
//! - Request/response contracts with shape validation
//! - Declarative query specs evaluated in memory or translated to SQL
//! - Port traits for the staged-write repository, summaries, principals
//! - Identity resolution (system principal, per-request memoization)
//! - The capability gate and the application services
//!
//! The storage adapter lives in `georef_postgres`; `testing` carries a
//! complete in-memory implementation of the ports.

pub mod bootstrap;
pub mod context;
pub mod contracts;
pub mod entity;
pub mod error;
pub mod geography;
pub mod identity;
pub mod permission;
pub mod ports;
pub mod query;
pub mod services;
pub mod summaries;
pub mod testing;

// Re-export the working set most callers need.
pub use context::{AuthContext, RequestContext};
pub use contracts::{
    CitySummarySearchRequest, CreateOrUpdateRequest, DeleteRequest, EmptyResponse,
    EntitiesResponse, EntityResponse, GetByIdRequest, GetByParentIdRequest, KeyResponse,
    SearchRequest, StateSummarySearchRequest, SummariesResponse, SummaryResponse, Validate,
};
pub use entity::{AuditFields, AuditedEntity, ScopedEntity};
pub use error::{EntityKind, GeoRefError, Result};
pub use geography::{
    City, CityInput, Country, CountryInput, Neighborhood, NeighborhoodInput, State, StateInput,
};
pub use identity::{IdentityResolver, Principal, PrincipalRecord, SystemPrincipalConfig};
pub use permission::{Capability, GrantTable, PermissionGate, PermissionScope};
pub use ports::{
    CurrentIdentity, EntityStore, GeoRepository, PrincipalStore, SummaryStore, UnitOfWork,
};
pub use query::{Condition, OrderBy, QuerySpec};
pub use services::{
    CityService, CitySummaryService, CountryService, CountrySummaryService, StateService,
    StateSummaryService,
};
pub use summaries::{CitySummary, CountrySummary, StateSummary, SummaryShape};
