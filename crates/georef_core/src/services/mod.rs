//! Application services, one per exposed resource.
//!
//! Every mutating service follows the same shape: validate the request
//! contract, check the capability, run the domain checks, then drive the
//! repository and finish with a single save.

pub mod city;
pub mod country;
pub mod state;
pub mod summaries;

pub use city::CityService;
pub use country::CountryService;
pub use state::StateService;
pub use summaries::{CitySummaryService, CountrySummaryService, StateSummaryService};
