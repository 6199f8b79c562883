/// Access policy evaluation
///
/// Every protected operation declares an [`AccessRequirement`]. Evaluating
/// it against a [`Session`] yields an [`AccessDecision`]: either `Allow`, or
/// a denial that names where the caller should be sent instead. Denials
/// are values, not errors; the HTTP layer turns them into responses.
///
/// # Requirement ladder
///
/// | Requirement        | Signed in | Approved | Role            |
/// |--------------------|-----------|----------|-----------------|
/// | `Authenticated`    | yes       | -        | any             |
/// | `Approved`         | yes       | yes      | any             |
/// | `Admin`            | yes       | yes      | admin or super  |
/// | `Superadmin`       | yes       | yes      | superadmin      |
///
/// # Example
///
/// ```
/// use bizacc_shared::auth::policy::{evaluate, AccessDecision, AccessRequirement};
/// use bizacc_shared::models::actor::SeedRegistry;
/// use bizacc_shared::session::Session;
/// use std::sync::Arc;
///
/// let session = Session::anonymous(Arc::new(SeedRegistry::default()));
/// assert_eq!(evaluate(&session, AccessRequirement::Approved), AccessDecision::RedirectLogin);
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::Session;

/// Where unauthenticated callers are sent
pub const LOGIN_PATH: &str = "/login";

/// Where signed-in but unapproved callers are sent
pub const PENDING_APPROVAL_PATH: &str = "/pending-approval";

/// What an operation demands of its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRequirement {
    /// Any signed-in actor, approved or not
    Authenticated,

    /// An approved actor
    Approved,

    /// An approved admin or superadmin
    Admin,

    /// An approved superadmin
    Superadmin,
}

impl AccessRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRequirement::Authenticated => "authenticated",
            AccessRequirement::Approved => "approved",
            AccessRequirement::Admin => "admin",
            AccessRequirement::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for AccessRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a policy check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,

    /// Not signed in
    RedirectLogin,

    /// Signed in but not approved (pending, rejected, or suspended)
    RedirectPendingApproval,

    /// Approved but lacking the role
    Forbidden,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    /// Path the caller should be redirected to, if any
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            AccessDecision::RedirectLogin => Some(LOGIN_PATH),
            AccessDecision::RedirectPendingApproval => Some(PENDING_APPROVAL_PATH),
            AccessDecision::Allow | AccessDecision::Forbidden => None,
        }
    }
}

/// Decides whether `session` meets `requirement`
pub fn evaluate(session: &Session, requirement: AccessRequirement) -> AccessDecision {
    if session.current_actor().is_none() {
        return AccessDecision::RedirectLogin;
    }

    if requirement == AccessRequirement::Authenticated {
        return AccessDecision::Allow;
    }

    if !session.has_approved_access() {
        return AccessDecision::RedirectPendingApproval;
    }

    let role_ok = match requirement {
        AccessRequirement::Authenticated | AccessRequirement::Approved => true,
        AccessRequirement::Admin => session.is_admin() || session.is_superadmin(),
        AccessRequirement::Superadmin => session.is_superadmin(),
    };

    if role_ok {
        AccessDecision::Allow
    } else {
        AccessDecision::Forbidden
    }
}

/// `true` only when [`evaluate`] allows
pub fn can_access(session: &Session, requirement: AccessRequirement) -> bool {
    evaluate(session, requirement).is_allowed()
}
