//! Country CRUD. Top of the hierarchy, so the duplicate-name rule is
//! global rather than scoped to a parent.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::contracts::{
    CreateOrUpdateRequest, DeleteRequest, EmptyResponse, EntityResponse, GetByIdRequest,
    KeyResponse, Validate,
};
use crate::error::{EntityKind, GeoRefError, Result};
use crate::geography::{Country, CountryInput};
use crate::permission::{Capability, PermissionGate};
use crate::ports::EntityStore;
use crate::query::QuerySpec;

pub struct CountryService {
    countries: Arc<dyn EntityStore<Country>>,
    gate: Arc<PermissionGate>,
}

impl CountryService {
    pub fn new(countries: Arc<dyn EntityStore<Country>>, gate: Arc<PermissionGate>) -> Self {
        Self { countries, gate }
    }

    pub async fn get(
        &self,
        request: GetByIdRequest,
        ctx: &RequestContext,
    ) -> Result<EntityResponse<Country>> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;

        let country = self
            .countries
            .get_first(QuerySpec::new().id_eq(request.id), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::Country))?;
        Ok(EntityResponse { entity: country })
    }

    pub async fn post(
        &self,
        request: CreateOrUpdateRequest<CountryInput>,
        ctx: &RequestContext,
    ) -> Result<KeyResponse> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;
        self.ensure_unique_name(&request.entity, ctx).await?;

        let mut country = request.entity.to_entity();
        self.countries.insert_and_save(&mut country, ctx).await?;
        Ok(KeyResponse { id: country.id })
    }

    pub async fn put(
        &self,
        request: CreateOrUpdateRequest<CountryInput>,
        ctx: &RequestContext,
    ) -> Result<KeyResponse> {
        request.validate()?;
        self.gate
            .validate(Capability::ManageSettings, None, ctx)
            .await?;
        self.ensure_unique_name(&request.entity, ctx).await?;

        let mut country = self
            .countries
            .get_first(QuerySpec::new().id_eq(request.entity.id_or_nil()), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::Country))?;
        request.entity.apply_to(&mut country);
        self.countries.update_and_save(&mut country, ctx).await?;
        Ok(KeyResponse { id: country.id })
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

        let country = self
            .countries
            .get_first(QuerySpec::new().id_eq(request.id), ctx)
            .await?
            .ok_or(GeoRefError::NotFound(EntityKind::Country))?;
        self.countries.delete_and_save(&country, ctx).await?;
        Ok(EmptyResponse {})
    }

    /// Another country may not carry the same name. The row being written
    /// excludes itself, so renaming a country onto its own name is fine.
    async fn ensure_unique_name(&self, input: &CountryInput, ctx: &RequestContext) -> Result<()> {
        let taken = QuerySpec::new()
            .name_eq(input.name.as_str())
            .id_ne(input.id_or_nil());
        if self.countries.has_any(taken, ctx).await? {
            return Err(GeoRefError::DuplicateName(EntityKind::Country));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::GrantTable;
    use crate::testing::{principal, MemoryRepository, StaticIdentity, WriteCounts};
    use uuid::Uuid;

    fn service() -> (CountryService, Arc<MemoryRepository>, RequestContext) {
        let identity = Arc::new(StaticIdentity::system_only());
        let repo = Arc::new(MemoryRepository::new(identity.clone()));
        let gate = Arc::new(PermissionGate::new(identity, GrantTable::new()));
        (
            CountryService::new(repo.clone(), gate),
            repo,
            RequestContext::anonymous(),
        )
    }

    fn input(name: &str) -> CreateOrUpdateRequest<CountryInput> {
        CreateOrUpdateRequest {
            entity: CountryInput {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    // ── Create ───────────────────────────────────────────────────

    #[tokio::test]
    async fn post_creates_a_country_and_returns_its_key() {
        let (service, repo, ctx) = service();

        let key = service.post(input("Brazil"), &ctx).await.unwrap();

        assert_ne!(key.id, Uuid::nil());
        let rows = repo.rows::<Country>().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, key.id);
        assert_eq!(rows[0].name, "Brazil");
        assert_eq!(
            repo.write_counts().await,
            WriteCounts {
                inserts: 1,
                saves: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn post_rejects_a_duplicate_name_without_writing() {
        let (service, repo, ctx) = service();
        repo.seed_country("Brazil").await;

        let err = service.post(input("Brazil"), &ctx).await.unwrap_err();

        assert!(matches!(
            err,
            GeoRefError::DuplicateName(EntityKind::Country)
        ));
        assert_eq!(repo.write_counts().await, WriteCounts::default());
    }

    #[tokio::test]
    async fn post_rejects_an_invalid_payload_before_storage() {
        let (service, repo, ctx) = service();

        let err = service.post(input("   "), &ctx).await.unwrap_err();

        assert!(matches!(err, GeoRefError::Validation(_)));
        assert_eq!(repo.write_counts().await, WriteCounts::default());
    }

    // ── Update ───────────────────────────────────────────────────

    #[tokio::test]
    async fn put_renames_the_existing_row() {
        let (service, repo, ctx) = service();
        let seeded = repo.seed_country("Brasil").await;

        let request = CreateOrUpdateRequest {
            entity: CountryInput {
                id: Some(seeded.id),
                name: "Brazil".into(),
                code: Some("BR".into()),
                ..Default::default()
            },
        };
        let key = service.put(request, &ctx).await.unwrap();

        assert_eq!(key.id, seeded.id);
        let rows = repo.rows::<Country>().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Brazil");
        assert_eq!(rows[0].code.as_deref(), Some("BR"));
        assert_eq!(rows[0].row_version, 2);
    }

    #[tokio::test]
    async fn put_keeping_the_own_name_is_not_a_duplicate() {
        let (service, repo, ctx) = service();
        let seeded = repo.seed_country("Brazil").await;

        let request = CreateOrUpdateRequest {
            entity: CountryInput {
                id: Some(seeded.id),
                name: "Brazil".into(),
                ..Default::default()
            },
        };
        service.put(request, &ctx).await.unwrap();
    }

    #[tokio::test]
    async fn put_unknown_id_is_not_found_and_stages_nothing() {
        let (service, repo, ctx) = service();

        let request = CreateOrUpdateRequest {
            entity: CountryInput {
                id: Some(Uuid::new_v4()),
                name: "Atlantis".into(),
                ..Default::default()
            },
        };
        let err = service.put(request, &ctx).await.unwrap_err();

        assert!(matches!(err, GeoRefError::NotFound(EntityKind::Country)));
        assert_eq!(repo.write_counts().await, WriteCounts::default());
    }

    // ── Delete / read ────────────────────────────────────────────

    #[tokio::test]
    async fn delete_removes_the_row() {
        let (service, repo, ctx) = service();
        let seeded = repo.seed_country("Brazil").await;

        service
            .delete(DeleteRequest { id: seeded.id }, &ctx)
            .await
            .unwrap();

        assert!(repo.rows::<Country>().await.is_empty());
        assert_eq!(repo.write_counts().await.deletes, 1);
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let (service, _repo, ctx) = service();

        let err = service
            .delete(DeleteRequest { id: Uuid::new_v4() }, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, GeoRefError::NotFound(EntityKind::Country)));
    }

    #[tokio::test]
    async fn get_returns_the_row_or_not_found() {
        let (service, repo, ctx) = service();
        let seeded = repo.seed_country("Brazil").await;

        let found = service
            .get(GetByIdRequest { id: seeded.id }, &ctx)
            .await
            .unwrap();
        assert_eq!(found.entity.name, "Brazil");

        let err = service
            .get(GetByIdRequest { id: Uuid::new_v4() }, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, GeoRefError::NotFound(EntityKind::Country)));
    }

    #[tokio::test]
    async fn get_rejects_the_nil_id() {
        let (service, _repo, ctx) = service();

        let err = service
            .get(GetByIdRequest { id: Uuid::nil() }, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, GeoRefError::Validation(_)));
    }

    // ── Authorization ────────────────────────────────────────────

    #[tokio::test]
    async fn ungranted_principal_is_rejected_without_writing() {
        let identity = Arc::new(StaticIdentity::acting_as(principal(
            "Ana",
            "ana@example.com",
        )));
        let repo = Arc::new(MemoryRepository::new(identity.clone()));
        let gate = Arc::new(PermissionGate::new(identity, GrantTable::new()));
        let service = CountryService::new(repo.clone(), gate);
        let ctx = RequestContext::anonymous();

        let err = service.post(input("Brazil"), &ctx).await.unwrap_err();

        assert!(matches!(err, GeoRefError::Unauthorized(_)));
        assert_eq!(repo.write_counts().await, WriteCounts::default());
    }

    #[tokio::test]
    async fn granted_principal_may_write() {
        let identity = Arc::new(StaticIdentity::acting_as(principal(
            "Ana",
            "ana@example.com",
        )));
        let repo = Arc::new(MemoryRepository::new(identity.clone()));
        let grants = GrantTable::new().grant("ana@example.com", Capability::ManageSettings);
        let gate = Arc::new(PermissionGate::new(identity, grants));
        let service = CountryService::new(repo.clone(), gate);
        let ctx = RequestContext::anonymous();

        service.post(input("Brazil"), &ctx).await.unwrap();
        let rows = repo.rows::<Country>().await;
        assert_eq!(rows[0].audit.created_by_name, "Ana");
    }
}
