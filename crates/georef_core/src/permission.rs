//! Capability checks consumed by every sensitive service call.
//!
//! The system principal passes everything unconditionally. Everyone else is
//! evaluated against the [`GrantTable`] assembled at startup; an absent
//! grant means deny.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{GeoRefError, Result};
use crate::identity::Principal;
use crate::ports::CurrentIdentity;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum Capability {
    /// Administer the geographic reference tables.
    ManageSettings,
}

/// Optional narrowing context (a concrete entity id) reserved for future
/// row-scoped rules. The current grant table ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionScope {
    pub entity_id: Option<Uuid>,
}

/// Explicit allow-list per principal email. Built once at startup; data,
/// not policy code.
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    grants: BTreeMap<String, BTreeSet<Capability>>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, email: impl Into<String>, capability: Capability) -> Self {
        self.grants.entry(email.into()).or_default().insert(capability);
        self
    }

    pub fn allows(
        &self,
        principal: &Principal,
        capability: Capability,
        _scope: Option<&PermissionScope>,
    ) -> bool {
        self.grants
            .get(&principal.email)
            .map(|capabilities| capabilities.contains(&capability))
            .unwrap_or(false)
    }

    pub fn granted_to(&self, principal: &Principal) -> BTreeSet<Capability> {
        self.grants.get(&principal.email).cloned().unwrap_or_default()
    }
}

pub struct PermissionGate {
    identity: Arc<dyn CurrentIdentity>,
    grants: GrantTable,
}

impl PermissionGate {
    pub fn new(identity: Arc<dyn CurrentIdentity>, grants: GrantTable) -> Self {
        Self { identity, grants }
    }

    /// Fails with `Unauthorized` when the current principal lacks the
    /// capability.
    pub async fn validate(
        &self,
        capability: Capability,
        scope: Option<&PermissionScope>,
        ctx: &RequestContext,
    ) -> Result<()> {
        if !self.has(capability, scope, ctx).await? {
            return Err(GeoRefError::Unauthorized(format!(
                "missing capability: {capability}"
            )));
        }
        Ok(())
    }

    /// Non-throwing form of [`PermissionGate::validate`].
    pub async fn has(
        &self,
        capability: Capability,
        scope: Option<&PermissionScope>,
        ctx: &RequestContext,
    ) -> Result<bool> {
        let principal = self.identity.current(ctx).await?;
        if principal.is_system {
            return Ok(true);
        }
        Ok(self.grants.allows(&principal, capability, scope))
    }

    pub async fn granted(
        &self,
        _scope: Option<&PermissionScope>,
        ctx: &RequestContext,
    ) -> Result<BTreeSet<Capability>> {
        let principal = self.identity.current(ctx).await?;
        if principal.is_system {
            return Ok(Capability::iter().collect());
        }
        Ok(self.grants.granted_to(&principal))
    }
}
