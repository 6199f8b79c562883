/// Per-request identity
///
/// A [`Session`] is the explicit answer to "who is making this request".
/// It is built once per request (from a validated token, or from the
/// persisted `user` key in single-profile deployments) and passed to the
/// access policy, visibility filter, and workflow actions.
///
/// Role helpers consult the [`SeedRegistry`]: a seed email is a superadmin
/// whatever role its stored record carries.
///
/// # Example
///
/// ```
/// use bizacc_shared::models::actor::SeedRegistry;
/// use bizacc_shared::session::Session;
/// use std::sync::Arc;
///
/// let session = Session::anonymous(Arc::new(SeedRegistry::default()));
/// assert!(session.current_actor().is_none());
/// assert!(!session.has_approved_access());
/// ```

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::actor::{Actor, ActorRole, SeedRegistry};
use crate::store::{EntityType, RecordStore, StoreError};

#[derive(Debug, Clone)]
pub struct Session {
    actor: Option<Actor>,
    seeds: Arc<SeedRegistry>,
}

impl Session {
    /// A session with nobody signed in
    pub fn anonymous(seeds: Arc<SeedRegistry>) -> Self {
        Self { actor: None, seeds }
    }

    /// A session for a known actor
    pub fn for_actor(actor: Actor, seeds: Arc<SeedRegistry>) -> Self {
        Self {
            actor: Some(actor),
            seeds,
        }
    }

    /// Looks the actor up in `allUsers`; unknown ids give an anonymous
    /// session
    pub async fn resolve(store: &RecordStore, actor_id: Uuid, seeds: Arc<SeedRegistry>) -> Self {
        match Actor::find_by_id(store, actor_id).await {
            Some(actor) => Self::for_actor(actor, seeds),
            None => {
                debug!(%actor_id, "Session actor not found");
                Self::anonymous(seeds)
            }
        }
    }

    pub fn current_actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn set_current_actor(&mut self, actor: Actor) {
        self.actor = Some(actor);
    }

    pub fn clear_current_actor(&mut self) {
        self.actor = None;
    }

    pub fn actor_id(&self) -> Option<Uuid> {
        self.actor.as_ref().map(|a| a.id)
    }

    pub fn seeds(&self) -> &SeedRegistry {
        &self.seeds
    }

    /// Role after applying the seed registry
    pub fn effective_role(&self) -> Option<ActorRole> {
        let actor = self.actor.as_ref()?;
        if self.seeds.contains(&actor.email) {
            Some(ActorRole::Superadmin)
        } else {
            Some(actor.role)
        }
    }

    pub fn is_superadmin(&self) -> bool {
        self.effective_role() == Some(ActorRole::Superadmin)
    }

    pub fn is_admin(&self) -> bool {
        self.effective_role() == Some(ActorRole::Admin)
    }

    pub fn is_user(&self) -> bool {
        self.effective_role() == Some(ActorRole::User)
    }

    /// Signed in and approved; seed superadmins always qualify
    pub fn has_approved_access(&self) -> bool {
        match &self.actor {
            Some(actor) => self.seeds.contains(&actor.email) || actor.is_approved(),
            None => false,
        }
    }

    /// Writes the current actor to the `user` key, or clears it
    pub async fn persist(&self, store: &RecordStore) -> Result<(), StoreError> {
        match &self.actor {
            Some(actor) => {
                store.save_object(EntityType::User, actor).await?;
            }
            None => {
                store.clear(EntityType::User).await?;
            }
        }
        Ok(())
    }

    /// Rebuilds a session from the `user` key
    pub async fn restore(store: &RecordStore, seeds: Arc<SeedRegistry>) -> Self {
        Self {
            actor: store.load_object(EntityType::User).await,
            seeds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::actor::ActorStatus;
    use crate::models::plan::PlanTier;
    use chrono::Utc;

    fn actor(email: &str, role: ActorRole, status: ActorStatus) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: String::new(),
            name: None,
            role,
            status,
            plan: PlanTier::Free,
            organization_id: None,
            admin_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn seeds() -> Arc<SeedRegistry> {
        Arc::new(SeedRegistry::default())
    }

    #[test]
    fn test_role_helpers() {
        let admin = Session::for_actor(actor("a@x.in", ActorRole::Admin, ActorStatus::Approved), seeds());
        assert!(admin.is_admin());
        assert!(!admin.is_superadmin());
        assert!(!admin.is_user());
        assert!(admin.has_approved_access());

        let pending = Session::for_actor(actor("u@x.in", ActorRole::User, ActorStatus::Pending), seeds());
        assert!(pending.is_user());
        assert!(!pending.has_approved_access());
    }

    #[test]
    fn test_seed_email_is_superadmin_whatever_stored_role() {
        let session = Session::for_actor(
            actor("Admin@BizAcc.in", ActorRole::User, ActorStatus::Pending),
            seeds(),
        );
        assert!(session.is_superadmin());
        assert!(!session.is_user());
        assert!(session.has_approved_access());
    }

    #[test]
    fn test_set_and_clear() {
        let mut session = Session::anonymous(seeds());
        assert!(session.effective_role().is_none());

        session.set_current_actor(actor("a@x.in", ActorRole::Admin, ActorStatus::Approved));
        assert!(session.actor_id().is_some());

        session.clear_current_actor();
        assert!(session.current_actor().is_none());
        assert!(!session.is_admin());
    }

    #[tokio::test]
    async fn test_persist_and_restore() {
        let store = RecordStore::memory();
        let a = actor("a@x.in", ActorRole::Admin, ActorStatus::Approved);

        Session::for_actor(a.clone(), seeds()).persist(&store).await.unwrap();
        let restored = Session::restore(&store, seeds()).await;
        assert_eq!(restored.actor_id(), Some(a.id));

        Session::anonymous(seeds()).persist(&store).await.unwrap();
        assert!(Session::restore(&store, seeds()).await.current_actor().is_none());
    }

    #[tokio::test]
    async fn test_resolve_unknown_actor_is_anonymous() {
        let store = RecordStore::memory();
        let session = Session::resolve(&store, Uuid::new_v4(), seeds()).await;
        assert!(session.current_actor().is_none());
    }
}
