/// Actor model and store operations
///
/// An actor is an authenticated identity: a superadmin, an organization
/// admin, or a user that belongs to one admin's organization. All actors
/// live in the `allUsers` collection.
///
/// # Organizations
///
/// An admin owns an `organization_id`. A user joins an organization by
/// carrying that id as its `admin_id`. Superadmins belong to no
/// organization and see everything.
///
/// # Status lifecycle
///
/// ```text
/// pending ──► approved ◄──► suspended
///    │
///    └──────► rejected
/// ```
///
/// Every other edge (including `rejected → approved`) is refused.
///
/// # Example
///
/// ```no_run
/// use bizacc_shared::models::actor::{Actor, ActorRole, NewActor};
/// use bizacc_shared::store::RecordStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RecordStore::memory();
///
/// let admin = Actor::create(&store, NewActor {
///     email: "owner@acme.in".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Acme Owner".to_string()),
///     role: ActorRole::Admin,
///     organization_id: None,
/// }).await?;
///
/// let found = Actor::find_by_email(&store, "OWNER@acme.in").await;
/// assert_eq!(found.map(|a| a.id), Some(admin.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::plan::PlanTier;
use crate::store::{EntityType, RecordStore, StoreError};

/// Email seeded as superadmin when nothing else is configured
pub const DEFAULT_SEED_SUPERADMIN: &str = "admin@bizacc.in";

/// Actor roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    /// Sees and manages everything
    Superadmin,

    /// Owns an organization and manages its users
    Admin,

    /// Member of one admin's organization
    User,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Superadmin => "superadmin",
            ActorRole::Admin => "admin",
            ActorRole::User => "user",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "superadmin" => Some(ActorRole::Superadmin),
            "admin" => Some(ActorRole::Admin),
            "user" => Some(ActorRole::User),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl ActorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorStatus::Pending => "pending",
            ActorStatus::Approved => "approved",
            ActorStatus::Rejected => "rejected",
            ActorStatus::Suspended => "suspended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ActorStatus::Pending),
            "approved" => Some(ActorStatus::Approved),
            "rejected" => Some(ActorStatus::Rejected),
            "suspended" => Some(ActorStatus::Suspended),
            _ => None,
        }
    }

    /// Whether `self → to` is an edge of the lifecycle
    pub fn can_transition_to(&self, to: ActorStatus) -> bool {
        matches!(
            (self, to),
            (ActorStatus::Pending, ActorStatus::Approved)
                | (ActorStatus::Pending, ActorStatus::Rejected)
                | (ActorStatus::Approved, ActorStatus::Suspended)
                | (ActorStatus::Suspended, ActorStatus::Approved)
        )
    }

    /// Moves to `to`, or fails if the edge is not allowed
    pub fn transition(self, to: ActorStatus) -> Result<ActorStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot change status from {from} to {to}")]
pub struct TransitionError {
    pub from: ActorStatus,
    pub to: ActorStatus,
}

/// Errors from actor operations
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("An account with email {0} already exists")]
    EmailTaken(String),

    #[error("Actor {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Actor record as stored in `allUsers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,

    /// Lowercased email, unique across actors
    pub email: String,

    /// Argon2id hash; empty for provisioned actors that never set one
    #[serde(default)]
    pub password_hash: String,

    #[serde(default)]
    pub name: Option<String>,

    pub role: ActorRole,

    pub status: ActorStatus,

    #[serde(default)]
    pub plan: PlanTier,

    /// Organization owned by an admin
    #[serde(default)]
    pub organization_id: Option<String>,

    /// Organization a user belongs to
    #[serde(default)]
    pub admin_id: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an actor
#[derive(Debug, Clone)]
pub struct NewActor {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: ActorRole,

    /// For admins, an explicit organization id (a new one is generated when
    /// absent); for users, the organization to join
    pub organization_id: Option<String>,
}

impl Actor {
    /// The organization this actor's records are grouped under
    pub fn organization(&self) -> Option<&str> {
        match self.role {
            ActorRole::Admin => self.organization_id.as_deref(),
            ActorRole::User => self.admin_id.as_deref(),
            ActorRole::Superadmin => None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == ActorStatus::Approved
    }

    /// Creates a pending actor on the free plan
    ///
    /// # Errors
    ///
    /// Returns `ActorError::EmailTaken` if the email is already registered.
    pub async fn create(store: &RecordStore, data: NewActor) -> Result<Actor, ActorError> {
        let now = Utc::now();
        let email = normalize_email(&data.email);

        let (organization_id, admin_id) = match data.role {
            ActorRole::Admin => (
                Some(
                    data.organization_id
                        .unwrap_or_else(|| Uuid::new_v4().to_string()),
                ),
                None,
            ),
            ActorRole::User => (None, data.organization_id),
            ActorRole::Superadmin => (None, None),
        };

        let actor = Actor {
            id: Uuid::new_v4(),
            email,
            password_hash: data.password_hash,
            name: data.name,
            role: data.role,
            status: ActorStatus::Pending,
            plan: PlanTier::Free,
            organization_id,
            admin_id,
            created_at: now,
            updated_at: now,
        };

        store
            .modify(EntityType::AllUsers, |actors: &mut Vec<Actor>| {
                if actors.iter().any(|a| a.email == actor.email) {
                    return Err(ActorError::EmailTaken(actor.email.clone()));
                }
                actors.push(actor.clone());
                Ok(())
            })
            .await?;

        info!(actor_id = %actor.id, role = %actor.role, "Actor created");
        Ok(actor)
    }

    /// Finds an actor by id
    pub async fn find_by_id(store: &RecordStore, id: Uuid) -> Option<Actor> {
        Self::list(store).await.into_iter().find(|a| a.id == id)
    }

    /// Finds an actor by email, ignoring case
    pub async fn find_by_email(store: &RecordStore, email: &str) -> Option<Actor> {
        let email = normalize_email(email);
        Self::list(store).await.into_iter().find(|a| a.email == email)
    }

    /// All actors
    pub async fn list(store: &RecordStore) -> Vec<Actor> {
        store.load(EntityType::AllUsers).await
    }

    /// Actors grouped under an organization (the admin and its users)
    pub async fn list_in_organization(store: &RecordStore, organization: &str) -> Vec<Actor> {
        Self::list(store)
            .await
            .into_iter()
            .filter(|a| a.organization() == Some(organization))
            .collect()
    }

    /// Applies `f` to one actor and persists the result
    ///
    /// `f` may run more than once under contention.
    pub async fn update<F>(store: &RecordStore, id: Uuid, mut f: F) -> Result<Actor, ActorError>
    where
        F: FnMut(&mut Actor) -> Result<(), ActorError>,
    {
        store
            .modify(EntityType::AllUsers, |actors: &mut Vec<Actor>| {
                let actor = actors
                    .iter_mut()
                    .find(|a| a.id == id)
                    .ok_or(ActorError::NotFound(id))?;
                f(actor)?;
                actor.updated_at = Utc::now();
                Ok(actor.clone())
            })
            .await
    }
}

/// Actor without credentials, for API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicActor {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: ActorRole,
    pub status: ActorStatus,
    pub plan: PlanTier,
    pub organization_id: Option<String>,
    pub admin_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Actor> for PublicActor {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id,
            email: actor.email.clone(),
            name: actor.name.clone(),
            role: actor.role,
            status: actor.status,
            plan: actor.plan,
            organization_id: actor.organization_id.clone(),
            admin_id: actor.admin_id.clone(),
            created_at: actor.created_at,
        }
    }
}

/// Id-indexed view of the known actors
#[derive(Debug, Clone, Default)]
pub struct ActorDirectory {
    actors: HashMap<Uuid, Actor>,
}

impl ActorDirectory {
    pub fn from_actors(actors: impl IntoIterator<Item = Actor>) -> Self {
        Self {
            actors: actors.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    /// Builds the directory from `allUsers`
    pub async fn load(store: &RecordStore) -> Self {
        Self::from_actors(Actor::list(store).await)
    }

    pub fn get(&self, id: Uuid) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.actors.contains_key(&id)
    }

    /// Adds or replaces an actor
    pub fn insert(&mut self, actor: Actor) {
        self.actors.insert(actor.id, actor);
    }

    /// Resolves a stored owner reference to an actor
    pub fn resolve(&self, owner_ref: &str) -> Option<&Actor> {
        Uuid::parse_str(owner_ref)
            .ok()
            .and_then(|id| self.actors.get(&id))
    }

    /// Organization of the actor an owner reference points at
    pub fn organization_of(&self, owner_ref: &str) -> Option<&str> {
        self.resolve(owner_ref).and_then(|a| a.organization())
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

/// Emails that are always superadmins
///
/// Seeds are provisioned into `allUsers` at start-up and also honoured by
/// [`crate::session::Session`] whatever role the stored record carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRegistry {
    emails: HashSet<String>,
}

impl SeedRegistry {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| normalize_email(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Registry with no seeds
    pub fn empty() -> Self {
        Self {
            emails: HashSet::new(),
        }
    }

    /// Parses a comma-separated list
    pub fn from_csv(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&normalize_email(email))
    }

    /// Seed emails in sorted order
    pub fn emails(&self) -> Vec<&str> {
        let mut emails: Vec<&str> = self.emails.iter().map(String::as_str).collect();
        emails.sort_unstable();
        emails
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

impl Default for SeedRegistry {
    fn default() -> Self {
        Self::new([DEFAULT_SEED_SUPERADMIN])
    }
}

/// Ensures every seed email exists as an approved superadmin
///
/// Existing actors are elevated in place. Missing ones are created with
/// `initial_password_hash`, or with no password (reset flow only) when
/// `None`. Returns the seed actors.
pub async fn provision_seed_superadmins(
    store: &RecordStore,
    seeds: &SeedRegistry,
    initial_password_hash: Option<&str>,
) -> Result<Vec<Actor>, StoreError> {
    if seeds.is_empty() {
        return Ok(Vec::new());
    }

    let provisioned = store
        .modify(EntityType::AllUsers, |actors: &mut Vec<Actor>| {
            let now = Utc::now();
            let mut provisioned = Vec::new();

            for email in seeds.emails() {
                match actors.iter_mut().find(|a| a.email == email) {
                    Some(actor) => {
                        if actor.role != ActorRole::Superadmin
                            || actor.status != ActorStatus::Approved
                        {
                            actor.role = ActorRole::Superadmin;
                            actor.status = ActorStatus::Approved;
                            actor.updated_at = now;
                        }
                        provisioned.push(actor.clone());
                    }
                    None => {
                        let actor = Actor {
                            id: Uuid::new_v4(),
                            email: email.to_string(),
                            password_hash: initial_password_hash.unwrap_or_default().to_string(),
                            name: Some("Super Admin".to_string()),
                            role: ActorRole::Superadmin,
                            status: ActorStatus::Approved,
                            plan: PlanTier::Enterprise,
                            organization_id: None,
                            admin_id: None,
                            created_at: now,
                            updated_at: now,
                        };
                        actors.push(actor.clone());
                        provisioned.push(actor);
                    }
                }
            }

            Ok::<_, StoreError>(provisioned)
        })
        .await?;

    info!(count = provisioned.len(), "Seed superadmins provisioned");
    Ok(provisioned)
}

/// Lowercases and trims an email
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
