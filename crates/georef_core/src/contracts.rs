//! Inbound request and outbound response contracts.
//!
//! Requests are plain serde shapes validated before any service logic runs.
//! Validation collects every problem into one `Validation` error (messages
//! joined with `"; "`, nested payloads prefixed with their list position)
//! so the boundary can surface them in a single response.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GeoRefError, Result};
use crate::geography::{CityInput, CountryInput, NeighborhoodInput, StateInput};

/// Upper bound for `name` and `code` on every input payload.
pub const MAX_NAME_LEN: usize = 200;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

// ── Requests ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateRequest<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetByIdRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetByParentIdRequest {
    pub parent_id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub take: Option<i64>,
    #[serde(default)]
    pub search_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummarySearchRequest {
    #[serde(flatten)]
    pub search: SearchRequest,
    #[serde(default)]
    pub country_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitySummarySearchRequest {
    #[serde(flatten)]
    pub search: SearchRequest,
    #[serde(default)]
    pub state_id: Option<Uuid>,
}

// ── Responses ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityResponse<T> {
    pub entity: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesResponse<T> {
    pub entities: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResponse {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse<S> {
    pub summary: S,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummariesResponse<S> {
    pub summaries: Vec<S>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyResponse {}

// ── Validation ───────────────────────────────────────────────────

fn check_name(name: &str, errors: &mut Vec<String>) {
    if name.trim().is_empty() {
        errors.push("name is required".into());
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("name exceeds {MAX_NAME_LEN} characters"));
    }
}

fn check_code(code: Option<&str>, errors: &mut Vec<String>) {
    if let Some(code) = code {
        if code.chars().count() > MAX_NAME_LEN {
            errors.push(format!("code exceeds {MAX_NAME_LEN} characters"));
        }
    }
}

fn check_id(label: &str, id: Uuid, errors: &mut Vec<String>) {
    if id.is_nil() {
        errors.push(format!("{label} requires a non-empty id"));
    }
}

fn finish(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(GeoRefError::Validation(errors.join("; ")))
    }
}

fn country_problems(input: &CountryInput, errors: &mut Vec<String>) {
    check_name(&input.name, errors);
    check_code(input.code.as_deref(), errors);
}

fn state_problems(input: &StateInput, errors: &mut Vec<String>) {
    check_name(&input.name, errors);
    check_code(input.code.as_deref(), errors);
    check_id("countryId", input.country_id, errors);
}

fn neighborhood_problems(input: &NeighborhoodInput, errors: &mut Vec<String>) {
    check_name(&input.name, errors);
    check_code(input.code.as_deref(), errors);
}

fn city_problems(input: &CityInput, errors: &mut Vec<String>) {
    check_name(&input.name, errors);
    check_code(input.code.as_deref(), errors);
    check_id("stateId", input.state_id, errors);

    for (position, request) in input.changed_neighborhood_requests.iter().enumerate() {
        let mut nested = Vec::new();
        neighborhood_problems(&request.entity, &mut nested);
        for problem in nested {
            errors.push(format!("changedNeighborhoodRequests[{position}]: {problem}"));
        }
    }
    for (position, request) in input.deleted_neighborhood_requests.iter().enumerate() {
        if request.id.is_nil() {
            errors.push(format!(
                "deletedNeighborhoodRequests[{position}]: id requires a non-empty id"
            ));
        }
    }
}

impl Validate for CountryInput {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        country_problems(self, &mut errors);
        finish(errors)
    }
}

impl Validate for StateInput {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        state_problems(self, &mut errors);
        finish(errors)
    }
}

impl Validate for CityInput {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        city_problems(self, &mut errors);
        finish(errors)
    }
}

impl Validate for NeighborhoodInput {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        neighborhood_problems(self, &mut errors);
        finish(errors)
    }
}

impl<T: Validate> Validate for CreateOrUpdateRequest<T> {
    fn validate(&self) -> Result<()> {
        self.entity.validate()
    }
}

impl Validate for DeleteRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        check_id("id", self.id, &mut errors);
        finish(errors)
    }
}

impl Validate for GetByIdRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        check_id("id", self.id, &mut errors);
        finish(errors)
    }
}

impl Validate for GetByParentIdRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        check_id("parentId", self.parent_id, &mut errors);
        finish(errors)
    }
}

impl Validate for SearchRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if let Some(take) = self.take {
            if take < 0 {
                errors.push("take must not be negative".into());
            }
        }
        finish(errors)
    }
}

impl Validate for StateSummarySearchRequest {
    fn validate(&self) -> Result<()> {
        self.search.validate()
    }
}

impl Validate for CitySummarySearchRequest {
    fn validate(&self) -> Result<()> {
        self.search.validate()
    }
}
