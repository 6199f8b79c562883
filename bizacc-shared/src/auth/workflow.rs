/// Approval workflow
///
/// Administrative actions on actors: approving or rejecting signups,
/// suspending and reinstating accounts, and changing plans. Each action
///
/// 1. checks the caller is an approved admin or superadmin,
/// 2. checks the caller may act on the target,
/// 3. applies the change through the status state machine,
/// 4. appends an [`AdminLog`] entry.
///
/// # Who may act on whom
///
/// - superadmins act on anyone except themselves and seed superadmins
/// - admins act only on `user` actors of their own organization
/// - nobody acts on themselves
///
/// # Example
///
/// ```no_run
/// use bizacc_shared::auth::workflow;
/// use bizacc_shared::session::Session;
/// use bizacc_shared::store::RecordStore;
/// use uuid::Uuid;
///
/// # async fn example(store: RecordStore, session: Session, pending: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let approved = workflow::approve(&store, &session, pending).await?;
/// assert!(approved.is_approved());
/// # Ok(())
/// # }
/// ```

use serde_json::json;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::policy::{evaluate, AccessDecision, AccessRequirement};
use crate::models::actor::{Actor, ActorError, ActorRole, ActorStatus, TransitionError};
use crate::models::admin_log::{AdminAction, AdminLog};
use crate::models::plan::{PlanCatalog, PlanTier};
use crate::models::subscription::Subscription;
use crate::session::Session;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Caller failed the admin policy check
    #[error("Access denied: {0:?}")]
    Denied(AccessDecision),

    #[error("Not allowed: {0}")]
    Forbidden(&'static str),

    #[error("Actors cannot change their own account")]
    SelfAction,

    #[error("Actor {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ActorError> for WorkflowError {
    fn from(e: ActorError) -> Self {
        match e {
            ActorError::NotFound(id) => WorkflowError::NotFound(id),
            ActorError::Transition(t) => WorkflowError::Transition(t),
            ActorError::Store(s) => WorkflowError::Store(s),
            ActorError::EmailTaken(_) => WorkflowError::Forbidden("email already registered"),
        }
    }
}

/// Checks `session` may act on `target`, returning the caller
fn authorize<'a>(session: &'a Session, target: &Actor) -> Result<&'a Actor, WorkflowError> {
    let decision = evaluate(session, AccessRequirement::Admin);
    if !decision.is_allowed() {
        return Err(WorkflowError::Denied(decision));
    }
    let caller = session
        .current_actor()
        .ok_or(WorkflowError::Denied(AccessDecision::RedirectLogin))?;

    if caller.id == target.id {
        return Err(WorkflowError::SelfAction);
    }
    if session.seeds().contains(&target.email) {
        return Err(WorkflowError::Forbidden("seed superadmins cannot be changed"));
    }
    if session.is_superadmin() {
        return Ok(caller);
    }

    let same_org = target.role == ActorRole::User
        && caller.organization_id.is_some()
        && target.admin_id == caller.organization_id;
    if same_org {
        Ok(caller)
    } else {
        Err(WorkflowError::Forbidden("admins may only manage users of their own organization"))
    }
}

async fn load_target(store: &RecordStore, target_id: Uuid) -> Result<Actor, WorkflowError> {
    Actor::find_by_id(store, target_id)
        .await
        .ok_or(WorkflowError::NotFound(target_id))
}

async fn move_status(
    store: &RecordStore,
    session: &Session,
    target_id: Uuid,
    to: ActorStatus,
) -> Result<Actor, WorkflowError> {
    let target = load_target(store, target_id).await?;
    let caller = authorize(session, &target)?;

    let mut from = target.status;
    let updated = Actor::update(store, target_id, |actor| {
        from = actor.status;
        actor.status = actor.status.transition(to)?;
        Ok(())
    })
    .await?;

    let action = match (from, to) {
        (ActorStatus::Suspended, ActorStatus::Approved) => AdminAction::Reinstate,
        (_, ActorStatus::Approved) => AdminAction::Approve,
        (_, ActorStatus::Rejected) => AdminAction::Reject,
        _ => AdminAction::Suspend,
    };

    AdminLog::record(
        store,
        AdminLog::new(
            caller.id,
            action,
            Some(target_id),
            json!({ "from": from.as_str(), "to": to.as_str() }),
        ),
    )
    .await?;

    info!(
        admin_id = %caller.id,
        target_id = %target_id,
        from = %from,
        to = %to,
        "Actor status changed"
    );
    Ok(updated)
}

/// `pending → approved`
pub async fn approve(store: &RecordStore, session: &Session, target_id: Uuid) -> Result<Actor, WorkflowError> {
    move_status(store, session, target_id, ActorStatus::Approved).await
}

/// `pending → rejected`
pub async fn reject(store: &RecordStore, session: &Session, target_id: Uuid) -> Result<Actor, WorkflowError> {
    move_status(store, session, target_id, ActorStatus::Rejected).await
}

/// `approved → suspended`
pub async fn suspend(store: &RecordStore, session: &Session, target_id: Uuid) -> Result<Actor, WorkflowError> {
    move_status(store, session, target_id, ActorStatus::Suspended).await
}

/// `suspended → approved`
pub async fn reinstate(store: &RecordStore, session: &Session, target_id: Uuid) -> Result<Actor, WorkflowError> {
    let target = load_target(store, target_id).await?;
    if target.status != ActorStatus::Suspended {
        return Err(TransitionError {
            from: target.status,
            to: ActorStatus::Approved,
        }
        .into());
    }
    move_status(store, session, target_id, ActorStatus::Approved).await
}

/// Moves an actor to another plan tier
///
/// Takes effect immediately. A [`Subscription`] entry records the change.
pub async fn change_plan(
    store: &RecordStore,
    session: &Session,
    target_id: Uuid,
    tier: PlanTier,
) -> Result<Actor, WorkflowError> {
    let target = load_target(store, target_id).await?;
    let caller = authorize(session, &target)?;

    let mut previous = target.plan;
    let updated = Actor::update(store, target_id, |actor| {
        previous = actor.plan;
        actor.plan = tier;
        Ok(())
    })
    .await?;

    let plan = PlanCatalog::load(store).await.get(tier);
    Subscription::record(store, Subscription::new(target_id, &plan, Some(previous), caller.id)).await?;
    AdminLog::record(
        store,
        AdminLog::new(
            caller.id,
            AdminAction::ChangePlan,
            Some(target_id),
            json!({ "from": previous.as_str(), "to": tier.as_str() }),
        ),
    )
    .await?;

    info!(admin_id = %caller.id, target_id = %target_id, plan = %tier, "Plan changed");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::actor::{NewActor, SeedRegistry};
    use crate::store::EntityType;
    use std::sync::Arc;

    struct Fixture {
        store: RecordStore,
        superadmin: Actor,
        admin: Actor,
        user: Actor,
        outsider: Actor,
    }

    async fn create(store: &RecordStore, email: &str, role: ActorRole, org: Option<String>) -> Actor {
        Actor::create(
            store,
            NewActor {
                email: email.to_string(),
                password_hash: String::new(),
                name: None,
                role,
                organization_id: org,
            },
        )
        .await
        .unwrap()
    }

    async fn force_status(store: &RecordStore, id: Uuid, status: ActorStatus) -> Actor {
        Actor::update(store, id, |a| {
            a.status = status;
            Ok(())
        })
        .await
        .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = RecordStore::memory();
        let superadmin = create(&store, "root@x.in", ActorRole::Superadmin, None).await;
        let superadmin = force_status(&store, superadmin.id, ActorStatus::Approved).await;

        let admin = create(&store, "boss@acme.in", ActorRole::Admin, Some("org-acme".into())).await;
        let admin = force_status(&store, admin.id, ActorStatus::Approved).await;

        let user = create(&store, "clerk@acme.in", ActorRole::User, Some("org-acme".into())).await;
        let outsider = create(&store, "clerk@other.in", ActorRole::User, Some("org-other".into())).await;

        Fixture {
            store,
            superadmin,
            admin,
            user,
            outsider,
        }
    }

    fn session(actor: &Actor) -> Session {
        Session::for_actor(actor.clone(), Arc::new(SeedRegistry::default()))
    }

    #[tokio::test]
    async fn test_admin_approves_own_organization_user() {
        let f = fixture().await;

        let approved = approve(&f.store, &session(&f.admin), f.user.id).await.unwrap();
        assert_eq!(approved.status, ActorStatus::Approved);

        let logs = AdminLog::list(&f.store, 10).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AdminAction::Approve);
        assert_eq!(logs[0].target_id, Some(f.user.id));
    }

    #[tokio::test]
    async fn test_admin_cannot_touch_other_organizations() {
        let f = fixture().await;

        let err = approve(&f.store, &session(&f.admin), f.outsider.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        // Superadmins can
        approve(&f.store, &session(&f.superadmin), f.outsider.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_nobody_changes_themselves() {
        let f = fixture().await;
        let err = suspend(&f.store, &session(&f.admin), f.admin.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::SelfAction));
    }

    #[tokio::test]
    async fn test_unapproved_or_plain_users_are_denied() {
        let f = fixture().await;

        let err = approve(&f.store, &session(&f.user), f.outsider.id).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Denied(AccessDecision::RedirectPendingApproval)
        ));

        let approved_user = force_status(&f.store, f.user.id, ActorStatus::Approved).await;
        let err = approve(&f.store, &session(&approved_user), f.outsider.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Denied(AccessDecision::Forbidden)));
    }

    #[tokio::test]
    async fn test_full_lifecycle_and_illegal_edges() {
        let f = fixture().await;
        let admin = session(&f.admin);

        approve(&f.store, &admin, f.user.id).await.unwrap();
        suspend(&f.store, &admin, f.user.id).await.unwrap();
        let back = reinstate(&f.store, &admin, f.user.id).await.unwrap();
        assert_eq!(back.status, ActorStatus::Approved);

        // approved → rejected is not an edge
        let err = reject(&f.store, &admin, f.user.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Transition(_)));

        // reinstate only applies to suspended actors
        let err = reinstate(&f.store, &admin, f.user.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Transition(_)));

        let actions: Vec<AdminAction> = AdminLog::list(&f.store, 10)
            .await
            .into_iter()
            .map(|l| l.action)
            .collect();
        assert_eq!(actions.len(), 3);
        assert!(actions.contains(&AdminAction::Reinstate));
    }

    #[tokio::test]
    async fn test_rejected_cannot_be_approved() {
        let f = fixture().await;
        let admin = session(&f.admin);

        reject(&f.store, &admin, f.user.id).await.unwrap();
        let err = approve(&f.store, &admin, f.user.id).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Transition(TransitionError {
                from: ActorStatus::Rejected,
                to: ActorStatus::Approved
            })
        ));

        let stored = Actor::find_by_id(&f.store, f.user.id).await.unwrap();
        assert_eq!(stored.status, ActorStatus::Rejected);
    }

    #[tokio::test]
    async fn test_change_plan_records_subscription() {
        let f = fixture().await;

        let updated = change_plan(&f.store, &session(&f.superadmin), f.admin.id, PlanTier::Professional)
            .await
            .unwrap();
        assert_eq!(updated.plan, PlanTier::Professional);

        let history = Subscription::history(&f.store, f.admin.id).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_plan, Some(PlanTier::Free));

        let subs: Vec<serde_json::Value> = f.store.load(EntityType::Subscriptions).await;
        assert_eq!(subs.len(), 1);
    }

    #[tokio::test]
    async fn test_seed_superadmins_are_protected() {
        let f = fixture().await;
        let seed = create(&f.store, "admin@bizacc.in", ActorRole::User, None).await;

        let err = suspend(&f.store, &session(&f.superadmin), seed.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }
}
