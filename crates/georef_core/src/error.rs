use thiserror::Error;

/// Entity level an error refers to. Drives the per-level duplicate-name
/// codes the boundary layer surfaces to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Country,
    State,
    City,
    Neighborhood,
    Principal,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::State => "state",
            Self::City => "city",
            Self::Neighborhood => "neighborhood",
            Self::Principal => "principal",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GeoRefError {
    #[error("not found: {0}")]
    NotFound(EntityKind),

    #[error("duplicate name: {0}")]
    DuplicateName(EntityKind),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("configuration: {0}")]
    Configuration(String),

    #[error("identity: {0}")]
    Identity(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GeoRefError {
    /// Stable machine-readable code. Boundary layers map on this, never on
    /// the display string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "entity_not_found",
            Self::DuplicateName(EntityKind::Country) => "country_duplicate_name",
            Self::DuplicateName(EntityKind::State) => "state_duplicate_name",
            Self::DuplicateName(EntityKind::City) => "city_duplicate_name",
            Self::DuplicateName(EntityKind::Neighborhood) => "neighborhood_duplicate_name",
            Self::DuplicateName(EntityKind::Principal) => "principal_duplicate_name",
            Self::Integrity(_) => "integrity_violation",
            Self::Concurrency(_) => "concurrency_conflict",
            Self::Unauthorized(_) => "security_validation",
            Self::Configuration(_) => "configuration",
            Self::Identity(_) => "identity_claims",
            Self::Validation(_) => "request_validation",
            Self::Internal(_) => "internal",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::DuplicateName(_) => 409,
            Self::Integrity(_) => 500,
            Self::Concurrency(_) => 409,
            Self::Unauthorized(_) => 403,
            Self::Configuration(_) => 500,
            Self::Identity(_) => 401,
            Self::Validation(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoRefError>;

#[cfg(test)]
mod tests {
    use super::*;

    // ── http_status: exhaustive variant coverage ──────────────────

    #[test]
    fn http_status_not_found() {
        assert_eq!(GeoRefError::NotFound(EntityKind::City).http_status(), 404);
    }

    #[test]
    fn http_status_duplicate_name() {
        assert_eq!(
            GeoRefError::DuplicateName(EntityKind::State).http_status(),
            409
        );
    }

    #[test]
    fn http_status_integrity() {
        assert_eq!(GeoRefError::Integrity("x".into()).http_status(), 500);
    }

    #[test]
    fn http_status_concurrency() {
        assert_eq!(GeoRefError::Concurrency("x".into()).http_status(), 409);
    }

    #[test]
    fn http_status_unauthorized() {
        assert_eq!(GeoRefError::Unauthorized("x".into()).http_status(), 403);
    }

    #[test]
    fn http_status_configuration() {
        assert_eq!(GeoRefError::Configuration("x".into()).http_status(), 500);
    }

    #[test]
    fn http_status_identity() {
        assert_eq!(GeoRefError::Identity("x".into()).http_status(), 401);
    }

    #[test]
    fn http_status_validation() {
        assert_eq!(GeoRefError::Validation("x".into()).http_status(), 400);
    }

    #[test]
    fn http_status_internal() {
        let err = GeoRefError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(err.http_status(), 500);
    }

    // ── code: stable machine-readable identifiers ─────────────────

    #[test]
    fn code_not_found() {
        assert_eq!(
            GeoRefError::NotFound(EntityKind::Neighborhood).code(),
            "entity_not_found"
        );
    }

    #[test]
    fn code_duplicate_name_per_level() {
        assert_eq!(
            GeoRefError::DuplicateName(EntityKind::Country).code(),
            "country_duplicate_name"
        );
        assert_eq!(
            GeoRefError::DuplicateName(EntityKind::State).code(),
            "state_duplicate_name"
        );
        assert_eq!(
            GeoRefError::DuplicateName(EntityKind::City).code(),
            "city_duplicate_name"
        );
        assert_eq!(
            GeoRefError::DuplicateName(EntityKind::Neighborhood).code(),
            "neighborhood_duplicate_name"
        );
        assert_eq!(
            GeoRefError::DuplicateName(EntityKind::Principal).code(),
            "principal_duplicate_name"
        );
    }

    #[test]
    fn code_integrity() {
        assert_eq!(GeoRefError::Integrity("x".into()).code(), "integrity_violation");
    }

    #[test]
    fn code_concurrency() {
        assert_eq!(
            GeoRefError::Concurrency("x".into()).code(),
            "concurrency_conflict"
        );
    }

    #[test]
    fn code_unauthorized() {
        assert_eq!(
            GeoRefError::Unauthorized("x".into()).code(),
            "security_validation"
        );
    }

    #[test]
    fn code_configuration() {
        assert_eq!(GeoRefError::Configuration("x".into()).code(), "configuration");
    }

    #[test]
    fn code_identity() {
        assert_eq!(GeoRefError::Identity("x".into()).code(), "identity_claims");
    }

    #[test]
    fn code_validation() {
        assert_eq!(GeoRefError::Validation("x".into()).code(), "request_validation");
    }

    #[test]
    fn code_internal() {
        assert_eq!(GeoRefError::Internal(anyhow::anyhow!("e")).code(), "internal");
    }

    // ── Display ──────────────────────────────────────────────────

    #[test]
    fn display_not_found() {
        let e = GeoRefError::NotFound(EntityKind::City);
        assert_eq!(e.to_string(), "not found: city");
    }

    #[test]
    fn display_duplicate_name() {
        let e = GeoRefError::DuplicateName(EntityKind::Neighborhood);
        assert_eq!(e.to_string(), "duplicate name: neighborhood");
    }

    #[test]
    fn display_concurrency() {
        let e = GeoRefError::Concurrency("states row 42".into());
        assert_eq!(e.to_string(), "concurrency conflict: states row 42");
    }

    #[test]
    fn display_internal() {
        let e = GeoRefError::Internal(anyhow::anyhow!("pool gone"));
        assert_eq!(e.to_string(), "internal: pool gone");
    }

    // ── EntityKind ───────────────────────────────────────────────

    #[test]
    fn entity_kind_as_str() {
        assert_eq!(EntityKind::Country.as_str(), "country");
        assert_eq!(EntityKind::State.as_str(), "state");
        assert_eq!(EntityKind::City.as_str(), "city");
        assert_eq!(EntityKind::Neighborhood.as_str(), "neighborhood");
        assert_eq!(EntityKind::Principal.as_str(), "principal");
    }

    #[test]
    fn entity_kind_display_matches_as_str() {
        assert_eq!(EntityKind::State.to_string(), "state");
    }
}
