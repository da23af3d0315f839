//! Application assembly.
//!
//! The registration catalog replaces marker-interface scanning with plain
//! data: every component the application wires, with the lifetime the host
//! is expected to give it. `AppServices::wire` builds the service set over
//! any repository implementation, and `initialize` runs the startup work
//! that must happen before the first request.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::identity::{IdentityResolver, Principal};
use crate::permission::PermissionGate;
use crate::ports::GeoRepository;
use crate::services::{
    CityService, CitySummaryService, CountryService, CountrySummaryService, StateService,
    StateSummaryService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Fresh per resolution.
    Transient,
    /// One per request.
    Scoped,
    /// One per process.
    Singleton,
}

#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub name: &'static str,
    pub lifetime: Lifetime,
}

pub const REGISTRATIONS: &[Registration] = &[
    Registration {
        name: "SystemPrincipalConfig",
        lifetime: Lifetime::Singleton,
    },
    Registration {
        name: "GrantTable",
        lifetime: Lifetime::Singleton,
    },
    Registration {
        name: "PermissionGate",
        lifetime: Lifetime::Singleton,
    },
    Registration {
        name: "IdentityResolver",
        lifetime: Lifetime::Singleton,
    },
    Registration {
        name: "RequestContext",
        lifetime: Lifetime::Scoped,
    },
    Registration {
        name: "Repository",
        lifetime: Lifetime::Scoped,
    },
    Registration {
        name: "CountryService",
        lifetime: Lifetime::Transient,
    },
    Registration {
        name: "StateService",
        lifetime: Lifetime::Transient,
    },
    Registration {
        name: "CityService",
        lifetime: Lifetime::Transient,
    },
    Registration {
        name: "CountrySummaryService",
        lifetime: Lifetime::Transient,
    },
    Registration {
        name: "StateSummaryService",
        lifetime: Lifetime::Transient,
    },
    Registration {
        name: "CitySummaryService",
        lifetime: Lifetime::Transient,
    },
];

/// The full service set, assembled over one repository session.
pub struct AppServices {
    pub countries: CountryService,
    pub states: StateService,
    pub cities: CityService,
    pub country_summaries: CountrySummaryService,
    pub state_summaries: StateSummaryService,
    pub city_summaries: CitySummaryService,
}

impl AppServices {
    pub fn wire<R: GeoRepository>(repo: Arc<R>, gate: Arc<PermissionGate>) -> Self {
        Self {
            countries: CountryService::new(repo.clone(), gate.clone()),
            states: StateService::new(repo.clone(), gate.clone()),
            cities: CityService::new(repo.clone(), repo.clone(), repo.clone(), gate),
            country_summaries: CountrySummaryService::new(repo.clone()),
            state_summaries: StateSummaryService::new(repo.clone()),
            city_summaries: CitySummaryService::new(repo),
        }
    }
}

/// Startup work: provision or sync the system principal (which also drops
/// the stale cache entry) so identity resolution never has to create it
/// lazily.
pub async fn initialize(resolver: &IdentityResolver) -> Result<Principal> {
    let system = resolver.provision_system_principal().await?;
    info!(principal = %system.name, "system principal ready");
    Ok(system)
}
