//! Entity-shape abstraction shared by every persisted type.
//!
//! The audited repository is generic over [`AuditedEntity`]: anything that
//! exposes an id, the audit block, and a concurrency token can flow through
//! staging, stamping, and save. [`ScopedEntity`] adds the name/code/parent
//! shape the query layer filters on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EntityKind;

/// Audit block carried by every persisted row. Set exclusively by the
/// repository layer at stamping time, never by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFields {
    pub created_at: DateTime<Utc>,
    pub created_by_id: Uuid,
    pub created_by_name: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by_id: Option<Uuid>,
    pub updated_by_name: Option<String>,
}

impl Default for AuditFields {
    fn default() -> Self {
        Self {
            created_at: DateTime::UNIX_EPOCH,
            created_by_id: Uuid::nil(),
            created_by_name: String::new(),
            updated_at: None,
            updated_by_id: None,
            updated_by_name: None,
        }
    }
}

pub trait AuditedEntity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn set_id(&mut self, id: Uuid);
    fn audit(&self) -> &AuditFields;
    fn audit_mut(&mut self) -> &mut AuditFields;
    fn row_version(&self) -> i64;
    fn set_row_version(&mut self, version: i64);

    /// Insert-time stamp. Creation and update fields are written together
    /// (insert-as-first-update convention).
    fn stamp_created(&mut self, now: DateTime<Utc>, by_id: Uuid, by_name: &str) {
        let audit = self.audit_mut();
        audit.created_at = now;
        audit.created_by_id = by_id;
        audit.created_by_name = by_name.to_string();
        audit.updated_at = Some(now);
        audit.updated_by_id = Some(by_id);
        audit.updated_by_name = Some(by_name.to_string());
    }

    /// Update-time stamp. Creation fields are left untouched.
    fn stamp_updated(&mut self, now: DateTime<Utc>, by_id: Uuid, by_name: &str) {
        let audit = self.audit_mut();
        audit.updated_at = Some(now);
        audit.updated_by_id = Some(by_id);
        audit.updated_by_name = Some(by_name.to_string());
    }
}

/// Name/code/parent shape shared by the four geographic levels. Queries
/// filter and search on these accessors without knowing the concrete type.
pub trait ScopedEntity: AuditedEntity {
    fn name(&self) -> &str;
    fn code(&self) -> Option<&str>;
    /// Immediate parent id; `None` for the root level (Country).
    fn parent_id(&self) -> Option<Uuid>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Sample {
        id: Uuid,
        audit: AuditFields,
        row_version: i64,
    }

    impl AuditedEntity for Sample {
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

    fn sample() -> Sample {
        Sample {
            id: Uuid::nil(),
            audit: AuditFields::default(),
            row_version: 1,
        }
    }

    #[test]
    fn default_audit_fields_are_unset() {
        let audit = AuditFields::default();
        assert_eq!(audit.created_at, DateTime::UNIX_EPOCH);
        assert_eq!(audit.created_by_id, Uuid::nil());
        assert!(audit.created_by_name.is_empty());
        assert!(audit.updated_at.is_none());
        assert!(audit.updated_by_id.is_none());
        assert!(audit.updated_by_name.is_none());
    }

    #[test]
    fn stamp_created_writes_both_blocks() {
        let mut e = sample();
        let now = Utc::now();
        let actor = Uuid::new_v4();

        e.stamp_created(now, actor, "System Admin");

        assert_eq!(e.audit().created_at, now);
        assert_eq!(e.audit().created_by_id, actor);
        assert_eq!(e.audit().created_by_name, "System Admin");
        assert_eq!(e.audit().updated_at, Some(now));
        assert_eq!(e.audit().updated_by_id, Some(actor));
        assert_eq!(e.audit().updated_by_name.as_deref(), Some("System Admin"));
    }

    #[test]
    fn stamp_updated_leaves_creation_block_alone() {
        let mut e = sample();
        let created = Utc::now();
        let creator = Uuid::new_v4();
        e.stamp_created(created, creator, "creator");

        let later = created + chrono::Duration::seconds(5);
        let editor = Uuid::new_v4();
        e.stamp_updated(later, editor, "editor");

        assert_eq!(e.audit().created_at, created);
        assert_eq!(e.audit().created_by_id, creator);
        assert_eq!(e.audit().created_by_name, "creator");
        assert_eq!(e.audit().updated_at, Some(later));
        assert_eq!(e.audit().updated_by_id, Some(editor));
        assert_eq!(e.audit().updated_by_name.as_deref(), Some("editor"));
    }
}
