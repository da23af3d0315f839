//! Read-only summary lookups for pickers and list screens.
//!
//! These skip the permission gate: summaries expose only names and parent
//! names, and every authenticated surface is allowed to read them. Free
//! text is trimmed before matching and matches id, name, or code without
//! case; results always come back ordered by name.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::contracts::{
    CitySummarySearchRequest, GetByIdRequest, SearchRequest, StateSummarySearchRequest,
    SummariesResponse, SummaryResponse, Validate,
};
use crate::entity::ScopedEntity;
use crate::error::{EntityKind, GeoRefError, Result};
use crate::ports::SummaryStore;
use crate::query::QuerySpec;
use crate::summaries::{CitySummary, CountrySummary, StateSummary};

fn search_spec<E: ScopedEntity>(search: &SearchRequest) -> QuerySpec<E> {
    let mut spec = QuerySpec::new();
    if let Some(needle) = search.search_text.as_deref() {
        let needle = needle.trim();
        if !needle.is_empty() {
            spec = spec.search(needle);
        }
    }
    spec = spec.order_by_name();
    if let Some(take) = search.take {
        spec = spec.take(take);
    }
    spec
}

pub struct CountrySummaryService {
    summaries: Arc<dyn SummaryStore<CountrySummary>>,
}

impl CountrySummaryService {
    pub fn new(summaries: Arc<dyn SummaryStore<CountrySummary>>) -> Self {
        Self { summaries }
    }

    pub async fn get_summaries(
        &self,
        request: SearchRequest,
        ctx: &RequestContext,
    ) -> Result<SummariesResponse<CountrySummary>> {
        request.validate()?;
        let spec = search_spec(&request);
        Ok(SummariesResponse {
            summaries: self.summaries.get_summaries(spec, ctx).await?,
        })
    }

    pub async fn get_summary(
        &self,
        request: GetByIdRequest,
        ctx: &RequestContext,
    ) -> Result<SummaryResponse<CountrySummary>> {
        request.validate()?;
        let summary = self
            .summaries
            .get_summary_first(QuerySpec::new().id_eq(request.id), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::Country))?;
        Ok(SummaryResponse { summary })
    }
}

pub struct StateSummaryService {
    summaries: Arc<dyn SummaryStore<StateSummary>>,
}

impl StateSummaryService {
    pub fn new(summaries: Arc<dyn SummaryStore<StateSummary>>) -> Self {
        Self { summaries }
    }

    pub async fn get_summaries(
        &self,
        request: StateSummarySearchRequest,
        ctx: &RequestContext,
    ) -> Result<SummariesResponse<StateSummary>> {
        request.validate()?;
        let mut spec = search_spec(&request.search);
        if let Some(country_id) = request.country_id {
            spec = spec.parent_eq(country_id);
        }
        Ok(SummariesResponse {
            summaries: self.summaries.get_summaries(spec, ctx).await?,
        })
    }

    pub async fn get_summary(
        &self,
        request: GetByIdRequest,
        ctx: &RequestContext,
    ) -> Result<SummaryResponse<StateSummary>> {
        request.validate()?;
        let summary = self
            .summaries
            .get_summary_first(QuerySpec::new().id_eq(request.id), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::State))?;
        Ok(SummaryResponse { summary })
    }
}

pub struct CitySummaryService {
    summaries: Arc<dyn SummaryStore<CitySummary>>,
}

impl CitySummaryService {
    pub fn new(summaries: Arc<dyn SummaryStore<CitySummary>>) -> Self {
        Self { summaries }
    }

    pub async fn get_summaries(
        &self,
        request: CitySummarySearchRequest,
        ctx: &RequestContext,
    ) -> Result<SummariesResponse<CitySummary>> {
        request.validate()?;
        let mut spec = search_spec(&request.search);
        if let Some(state_id) = request.state_id {
            spec = spec.parent_eq(state_id);
        }
        Ok(SummariesResponse {
            summaries: self.summaries.get_summaries(spec, ctx).await?,
        })
    }

    pub async fn get_summary(
        &self,
        request: GetByIdRequest,
        ctx: &RequestContext,
    ) -> Result<SummaryResponse<CitySummary>> {
        request.validate()?;
        let summary = self
            .summaries
            .get_summary_first(QuerySpec::new().id_eq(request.id), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::City))?;
        Ok(SummaryResponse { summary })
    }
}
