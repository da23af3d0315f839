//! Acting-principal resolution.
//!
//! Every audited write is stamped with the identity resolved here. The
//! distinguished system principal doubles as the fallback identity for
//! unauthenticated contexts and as the creator of auto-provisioned rows.
//! Resolution is memoized per request on the [`RequestContext`]; the system
//! principal is additionally cached process-wide with an explicit
//! invalidation hook for configuration changes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::context::{AuthContext, RequestContext};
use crate::entity::AuditFields;
use crate::error::{GeoRefError, Result};
use crate::ports::{CurrentIdentity, PrincipalStore};

/// Resolved acting identity. The lightweight shape services and stamping
/// work with; the persisted row is [`PrincipalRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_system: bool,
}

/// Persisted principal row. Unlike the geographic entities these never flow
/// through the staged repository; the caller sets the audit block.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_system: bool,
    pub audit: AuditFields,
    pub row_version: i64,
}

impl PrincipalRecord {
    /// Self-stamped system row, created at startup provisioning.
    pub fn new_system(config: &SystemPrincipalConfig, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: config.name.clone(),
            email: config.email.clone(),
            is_system: true,
            audit: AuditFields {
                created_at: now,
                created_by_id: id,
                created_by_name: config.name.clone(),
                ..AuditFields::default()
            },
            row_version: 1,
        }
    }

    /// Row for a first-seen authenticated principal, stamped with the
    /// system principal's identity.
    pub fn new_standard(
        name: String,
        email: String,
        created_by: &Principal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            is_system: false,
            audit: AuditFields {
                created_at: now,
                created_by_id: created_by.id,
                created_by_name: created_by.name.clone(),
                ..AuditFields::default()
            },
            row_version: 1,
        }
    }

    pub fn to_principal(&self) -> Principal {
        Principal {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            is_system: self.is_system,
        }
    }
}

/// Configuration of the system principal. Read from
/// `GEOREF_SYSTEM_PRINCIPAL_NAME` / `GEOREF_SYSTEM_PRINCIPAL_EMAIL` in
/// deployments; constructed directly in tests and embedders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrincipalConfig {
    pub name: String,
    pub email: String,
}

impl SystemPrincipalConfig {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let config = Self {
            name: std::env::var("GEOREF_SYSTEM_PRINCIPAL_NAME").unwrap_or_default(),
            email: std::env::var("GEOREF_SYSTEM_PRINCIPAL_EMAIL").unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(GeoRefError::Configuration(
                "system principal name and email must be configured".into(),
            ));
        }
        Ok(())
    }
}

/// Resolves the acting principal from the request's authentication context.
pub struct IdentityResolver {
    store: Arc<dyn PrincipalStore>,
    config: SystemPrincipalConfig,
    system_cache: RwLock<Option<Principal>>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn PrincipalStore>, config: SystemPrincipalConfig) -> Self {
        Self {
            store,
            config,
            system_cache: RwLock::new(None),
        }
    }

    /// Drops the process-wide system-principal cache. Called whenever the
    /// system principal's configuration may have changed.
    pub async fn invalidate_system_cache(&self) {
        *self.system_cache.write().await = None;
    }

    /// Startup provisioning: create the system row if absent, or bring its
    /// name and email back in line with configuration when they drift.
    /// Always invalidates the process-wide cache afterwards.
    pub async fn provision_system_principal(&self) -> Result<Principal> {
        self.config.validate()?;

        let principal = match self.store.find_system().await? {
            None => {
                let record = PrincipalRecord::new_system(&self.config, Utc::now());
                self.store.insert(&record).await?;
                tracing::info!(principal_id = %record.id, "provisioned system principal");
                record.to_principal()
            }
            Some(mut record) => {
                if record.name != self.config.name || record.email != self.config.email {
                    record.name = self.config.name.clone();
                    record.email = self.config.email.clone();
                    record.audit.updated_at = Some(Utc::now());
                    record.audit.updated_by_id = Some(record.id);
                    record.audit.updated_by_name = Some(record.name.clone());
                    self.store.update(&record).await?;
                    tracing::info!(
                        principal_id = %record.id,
                        "synchronized system principal with configuration"
                    );
                }
                record.to_principal()
            }
        };

        self.invalidate_system_cache().await;
        Ok(principal)
    }

    async fn resolve_system(&self) -> Result<Principal> {
        self.config.validate()?;

        if let Some(cached) = self.system_cache.read().await.clone() {
            return Ok(cached);
        }

        let record = self.store.find_system().await?.ok_or_else(|| {
            GeoRefError::Configuration("no system principal has been provisioned".into())
        })?;
        let principal = record.to_principal();
        *self.system_cache.write().await = Some(principal.clone());
        Ok(principal)
    }

    async fn resolve_current(&self, ctx: &RequestContext) -> Result<Principal> {
        let (name, email) = match &ctx.auth {
            AuthContext::Anonymous => return self.system(ctx).await,
            AuthContext::Authenticated { name, email } => (name.clone(), email.clone()),
        };

        let email = email.filter(|e| !e.is_empty()).ok_or_else(|| {
            GeoRefError::Identity("authenticated context is missing an email claim".into())
        })?;
        let name = name.filter(|n| !n.is_empty()).unwrap_or_else(|| email.clone());

        if email == self.config.email {
            return self.system(ctx).await;
        }

        if let Some(record) = self.store.find_by_email(&email).await? {
            return Ok(record.to_principal());
        }

        let system = self.system(ctx).await?;
        let record = PrincipalRecord::new_standard(name, email, &system, Utc::now());
        self.store.insert(&record).await?;
        tracing::debug!(principal_id = %record.id, "auto-created principal on first sight");
        Ok(record.to_principal())
    }
}

#[async_trait]
impl CurrentIdentity for IdentityResolver {
    async fn current(&self, ctx: &RequestContext) -> Result<Principal> {
        ctx.current_principal
            .get_or_try_init(|| self.resolve_current(ctx))
            .await
            .map(Clone::clone)
    }

    async fn system(&self, ctx: &RequestContext) -> Result<Principal> {
        ctx.system_principal
            .get_or_try_init(|| self.resolve_system())
            .await
            .map(Clone::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryPrincipalStore;

    fn config() -> SystemPrincipalConfig {
        SystemPrincipalConfig::new("System Admin", "system@example.com")
    }

    async fn provisioned_resolver() -> (IdentityResolver, Arc<MemoryPrincipalStore>) {
        let store = Arc::new(MemoryPrincipalStore::default());
        let resolver = IdentityResolver::new(store.clone(), config());
        resolver.provision_system_principal().await.unwrap();
        (resolver, store)
    }

    // ── Configuration ────────────────────────────────────────────

    #[tokio::test]
    async fn blank_configuration_is_a_configuration_error() {
        let store = Arc::new(MemoryPrincipalStore::default());
        let resolver =
            IdentityResolver::new(store, SystemPrincipalConfig::new("  ", "system@example.com"));
        let err = resolver
            .system(&RequestContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, GeoRefError::Configuration(_)));
    }

    #[tokio::test]
    async fn missing_system_row_is_a_configuration_error() {
        let store = Arc::new(MemoryPrincipalStore::default());
        let resolver = IdentityResolver::new(store, config());
        let err = resolver
            .system(&RequestContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, GeoRefError::Configuration(_)));
    }

    // ── Provisioning ─────────────────────────────────────────────

    #[tokio::test]
    async fn provisioning_creates_a_self_stamped_system_row() {
        let (_resolver, store) = provisioned_resolver().await;
        let record = store.find_system().await.unwrap().unwrap();
        assert!(record.is_system);
        assert_eq!(record.name, "System Admin");
        assert_eq!(record.email, "system@example.com");
        assert_eq!(record.audit.created_by_id, record.id);
        assert_eq!(record.audit.created_by_name, "System Admin");
        assert!(record.audit.updated_at.is_none());
    }

    #[tokio::test]
    async fn provisioning_syncs_a_drifted_row() {
        let (_resolver, store) = provisioned_resolver().await;
        let before = store.find_system().await.unwrap().unwrap();

        let renamed = SystemPrincipalConfig::new("Root", "root@example.com");
        let resolver = IdentityResolver::new(store.clone(), renamed);
        let principal = resolver.provision_system_principal().await.unwrap();

        assert_eq!(principal.id, before.id);
        assert_eq!(principal.name, "Root");
        let after = store.find_system().await.unwrap().unwrap();
        assert_eq!(after.email, "root@example.com");
        assert_eq!(after.audit.updated_by_id, Some(after.id));
        assert_eq!(after.audit.updated_by_name.as_deref(), Some("Root"));
        assert_eq!(after.audit.created_at, before.audit.created_at);
    }

    #[tokio::test]
    async fn provisioning_is_idempotent_when_nothing_drifted() {
        let (resolver, store) = provisioned_resolver().await;
        let before = store.find_system().await.unwrap().unwrap();
        resolver.provision_system_principal().await.unwrap();
        let after = store.find_system().await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn provisioning_invalidates_the_process_wide_cache() {
        let (resolver, store) = provisioned_resolver().await;
        let warm = resolver
            .system(&RequestContext::anonymous())
            .await
            .unwrap();
        assert_eq!(warm.name, "System Admin");

        let resolver = IdentityResolver::new(store, SystemPrincipalConfig::new("Root", "root@example.com"));
        resolver.provision_system_principal().await.unwrap();
        let fresh = resolver
            .system(&RequestContext::anonymous())
            .await
            .unwrap();
        assert_eq!(fresh.name, "Root");
    }

    // ── Current-principal resolution ─────────────────────────────

    #[tokio::test]
    async fn anonymous_context_falls_back_to_system() {
        let (resolver, _store) = provisioned_resolver().await;
        let principal = resolver
            .current(&RequestContext::anonymous())
            .await
            .unwrap();
        assert!(principal.is_system);
    }

    #[tokio::test]
    async fn authenticated_without_email_is_an_identity_error() {
        let (resolver, _store) = provisioned_resolver().await;
        let ctx = RequestContext::authenticated(Some("Ana".into()), None);
        let err = resolver.current(&ctx).await.unwrap_err();
        assert!(matches!(err, GeoRefError::Identity(_)));

        let ctx = RequestContext::authenticated(Some("Ana".into()), Some("".into()));
        let err = resolver.current(&ctx).await.unwrap_err();
        assert!(matches!(err, GeoRefError::Identity(_)));
    }

    #[tokio::test]
    async fn configured_system_email_resolves_to_system() {
        let (resolver, _store) = provisioned_resolver().await;
        let ctx =
            RequestContext::authenticated(Some("Imposter".into()), Some("system@example.com".into()));
        let principal = resolver.current(&ctx).await.unwrap();
        assert!(principal.is_system);
        assert_eq!(principal.name, "System Admin");
    }

    #[tokio::test]
    async fn first_sight_auto_creates_a_row_stamped_by_system() {
        let (resolver, store) = provisioned_resolver().await;
        let system = resolver
            .system(&RequestContext::anonymous())
            .await
            .unwrap();

        let ctx = RequestContext::authenticated(Some("Ana".into()), Some("ana@example.com".into()));
        let principal = resolver.current(&ctx).await.unwrap();
        assert_eq!(principal.name, "Ana");
        assert!(!principal.is_system);

        let record = store.find_by_email("ana@example.com").await.unwrap().unwrap();
        assert_eq!(record.audit.created_by_id, system.id);
        assert_eq!(record.audit.created_by_name, system.name);
        assert!(record.audit.updated_at.is_none());
    }

    #[tokio::test]
    async fn missing_name_claim_defaults_to_email() {
        let (resolver, _store) = provisioned_resolver().await;
        let ctx = RequestContext::authenticated(None, Some("ana@example.com".into()));
        let principal = resolver.current(&ctx).await.unwrap();
        assert_eq!(principal.name, "ana@example.com");
    }

    #[tokio::test]
    async fn known_email_resolves_without_creating_again() {
        let (resolver, store) = provisioned_resolver().await;
        let ctx = RequestContext::authenticated(Some("Ana".into()), Some("ana@example.com".into()));
        resolver.current(&ctx).await.unwrap();

        let ctx = RequestContext::authenticated(Some("Renamed".into()), Some("ana@example.com".into()));
        let principal = resolver.current(&ctx).await.unwrap();
        // The stored row wins over the claim.
        assert_eq!(principal.name, "Ana");
        assert_eq!(store.principal_count().await, 2);
    }

    #[tokio::test]
    async fn resolution_is_memoized_per_request() {
        let (resolver, store) = provisioned_resolver().await;
        let ctx = RequestContext::authenticated(Some("Ana".into()), Some("ana@example.com".into()));
        let first = resolver.current(&ctx).await.unwrap();

        // Wiping the backing store proves the second call never re-reads it.
        store.clear().await;
        let second = resolver.current(&ctx).await.unwrap();
        assert_eq!(first, second);
    }
}
