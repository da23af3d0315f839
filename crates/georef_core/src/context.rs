//! Request-scoped context threaded through every service and port call.
//!
//! Carries the authentication claims extracted by the boundary plus the
//! per-request identity caches. The caches are explicit state on the
//! context, never hidden fields on a service, so concurrent requests can
//! share service instances freely.

use tokio::sync::OnceCell;

use crate::identity::Principal;

/// Claims the (out of scope) boundary extracted from the incoming call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    Anonymous,
    Authenticated {
        name: Option<String>,
        email: Option<String>,
    },
}

#[derive(Debug)]
pub struct RequestContext {
    pub auth: AuthContext,
    pub(crate) current_principal: OnceCell<Principal>,
    pub(crate) system_principal: OnceCell<Principal>,
}

impl RequestContext {
    pub fn new(auth: AuthContext) -> Self {
        Self {
            auth,
            current_principal: OnceCell::new(),
            system_principal: OnceCell::new(),
        }
    }

    /// Context for unauthenticated or background work. Identity resolution
    /// falls back to the system principal.
    pub fn anonymous() -> Self {
        Self::new(AuthContext::Anonymous)
    }

    pub fn authenticated(name: Option<String>, email: Option<String>) -> Self {
        Self::new(AuthContext::Authenticated { name, email })
    }
}
