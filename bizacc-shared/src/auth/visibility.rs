/// Tenant scoping of owned records
///
/// Records carry only their owner's id. Whether a caller may see a record
/// is decided by resolving that owner through the [`ActorDirectory`]:
///
/// - a superadmin sees every record, orphans included
/// - an admin sees records owned by any actor of its organization
/// - a user sees records owned by any actor of the organization it belongs
///   to
/// - an actor without an organization sees only its own records
///
/// Orphans (owners that do not resolve) are hidden from everybody but
/// superadmins until reconciliation assigns them.

use uuid::Uuid;

use crate::models::actor::{ActorDirectory, ActorRole};
use crate::models::record::OwnedRecord;
use crate::session::Session;

/// The slice of records a session may read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Everything
    Global,

    /// Records whose owner belongs to this organization
    Organization(String),

    /// Records owned by this actor
    OwnOnly(Uuid),

    /// Nothing (anonymous)
    Nothing,
}

impl Visibility {
    pub fn for_session(session: &Session) -> Self {
        let Some(actor) = session.current_actor() else {
            return Visibility::Nothing;
        };

        if session.is_superadmin() {
            return Visibility::Global;
        }

        match actor.role {
            ActorRole::Admin | ActorRole::User => match actor.organization() {
                Some(org) => Visibility::Organization(org.to_string()),
                None => Visibility::OwnOnly(actor.id),
            },
            ActorRole::Superadmin => Visibility::Global,
        }
    }

    /// Whether a record owned by `owner_ref` is inside this slice
    pub fn allows(&self, owner_ref: Option<&str>, directory: &ActorDirectory) -> bool {
        match self {
            Visibility::Global => true,
            Visibility::Nothing => false,
            Visibility::OwnOnly(id) => owner_ref
                .and_then(|o| Uuid::parse_str(o).ok())
                .is_some_and(|owner| owner == *id),
            Visibility::Organization(org) => owner_ref
                .and_then(|o| directory.organization_of(o))
                .is_some_and(|owner_org| owner_org == org.as_str()),
        }
    }
}

/// Keeps the records `session` may see
pub fn filter_visible<R: OwnedRecord>(
    session: &Session,
    records: Vec<R>,
    directory: &ActorDirectory,
) -> Vec<R> {
    let visibility = Visibility::for_session(session);
    records
        .into_iter()
        .filter(|r| visibility.allows(r.owner_ref().as_deref(), directory))
        .collect()
}

/// Whether `session` may change or delete `record`
///
/// Allowed for the owner, for an approved admin of the owner's
/// organization, and for superadmins.
pub fn can_modify<R: OwnedRecord>(session: &Session, record: &R, directory: &ActorDirectory) -> bool {
    let Some(actor) = session.current_actor() else {
        return false;
    };
    if !session.has_approved_access() {
        return false;
    }
    if session.is_superadmin() {
        return true;
    }

    let owner = record.owner_id();
    if owner == Some(actor.id) {
        return true;
    }

    if actor.role == ActorRole::Admin {
        if let (Some(admin_org), Some(owner)) = (actor.organization(), owner) {
            return directory
                .get(owner)
                .and_then(|o| o.organization())
                .is_some_and(|owner_org| owner_org == admin_org);
        }
    }

    false
}
