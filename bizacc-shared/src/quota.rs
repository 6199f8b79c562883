/// Plan quota enforcement
///
/// Checks an actor's usage against the limits of the plan that governs it,
/// before a new invoice, contact, or organization member is created.
///
/// # Governing plan
///
/// Admins and superadmins are governed by their own plan. Users are
/// governed by the plan of their organization's admin, so one subscription
/// covers the whole organization. Seed superadmins are never limited.
///
/// # Quota Types
///
/// - **Invoices**: invoices owned by anyone in the actor's organization
/// - **Contacts**: contacts owned by anyone in the actor's organization
/// - **Users**: actors in the organization, admin included
///
/// An actor without an organization only counts its own records.
///
/// # Enforcing under the write
///
/// [`QuotaEnforcer::guard`] captures the limit and the counted owners;
/// [`QuotaGuard::admit`] is then called inside the `modify` closure that
/// adds the record, so it sees the same records the write replaces.
///
/// # Example
///
/// ```no_run
/// use bizacc_shared::quota::{QuotaEnforcer, QuotaError, QuotaType};
/// use bizacc_shared::models::actor::Actor;
/// use bizacc_shared::models::record::Document;
/// use bizacc_shared::store::{EntityType, RecordStore, StoreError};
///
/// # #[derive(Debug)] enum AppError { Quota(QuotaError), Store(StoreError) }
/// # impl From<QuotaError> for AppError { fn from(e: QuotaError) -> Self { AppError::Quota(e) } }
/// # impl From<StoreError> for AppError { fn from(e: StoreError) -> Self { AppError::Store(e) } }
/// # async fn example(store: RecordStore, actor: Actor, contact: Document) -> Result<(), AppError> {
/// let guard = QuotaEnforcer::new(store.clone()).guard(&actor, QuotaType::Contacts).await;
/// store
///     .modify(EntityType::Contacts, |records: &mut Vec<Document>| {
///         guard.admit(records.as_slice())?;
///         records.push(contact.clone());
///         Ok::<_, AppError>(())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::models::actor::{Actor, ActorRole, SeedRegistry};
use crate::models::plan::{Plan, PlanCatalog, PlanTier};
use crate::models::record::{Document, OwnedRecord};
use crate::store::{EntityType, RecordStore};

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("{quota_type} limit exceeded ({current}/{limit})")]
    LimitExceeded {
        quota_type: QuotaType,
        limit: u32,
        current: u32,
    },

    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaType {
    Invoices,
    Contacts,
    Users,
}

impl QuotaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaType::Invoices => "Invoices",
            QuotaType::Contacts => "Contacts",
            QuotaType::Users => "Users",
        }
    }

    /// Collection whose records are counted; `None` for users
    pub fn entity(&self) -> Option<EntityType> {
        match self {
            QuotaType::Invoices => Some(EntityType::Invoices),
            QuotaType::Contacts => Some(EntityType::Contacts),
            QuotaType::Users => None,
        }
    }
}

impl fmt::Display for QuotaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits of one plan; `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub invoices: Option<u32>,
    pub contacts: Option<u32>,
    pub users: Option<u32>,
}

impl QuotaLimits {
    pub fn for_plan(plan: &Plan) -> Self {
        QuotaLimits {
            invoices: plan.max_invoices,
            contacts: plan.max_contacts,
            users: plan.max_users,
        }
    }

    pub fn unlimited() -> Self {
        QuotaLimits {
            invoices: None,
            contacts: None,
            users: None,
        }
    }

    pub fn get(&self, quota_type: QuotaType) -> Option<u32> {
        match quota_type {
            QuotaType::Invoices => self.invoices,
            QuotaType::Contacts => self.contacts,
            QuotaType::Users => self.users,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaCheckResult {
    /// Whether one more item may be created
    pub allowed: bool,

    pub current: u32,

    pub limit: Option<u32>,

    /// Items left before the limit; `None` when unlimited
    pub remaining: Option<u32>,
}

impl QuotaCheckResult {
    fn evaluate(current: u32, limit: Option<u32>) -> Self {
        match limit {
            None => QuotaCheckResult {
                allowed: true,
                current,
                limit,
                remaining: None,
            },
            Some(limit) => QuotaCheckResult {
                allowed: current < limit,
                current,
                limit: Some(limit),
                remaining: Some(limit.saturating_sub(current)),
            },
        }
    }
}

/// A limit and the owners whose records count toward it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaGuard {
    quota_type: QuotaType,
    limit: Option<u32>,
    owners: HashSet<Uuid>,
}

impl QuotaGuard {
    pub fn unlimited(quota_type: QuotaType) -> Self {
        QuotaGuard {
            quota_type,
            limit: None,
            owners: HashSet::new(),
        }
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Records in `records` that count against this limit
    pub fn count<R: OwnedRecord>(&self, records: &[R]) -> u32 {
        records
            .iter()
            .filter(|r| r.owner_id().is_some_and(|id| self.owners.contains(&id)))
            .count() as u32
    }

    pub fn evaluate<R: OwnedRecord>(&self, records: &[R]) -> QuotaCheckResult {
        QuotaCheckResult::evaluate(self.count(records), self.limit)
    }

    /// Fails with `LimitExceeded` when `records` leave no room for one more
    pub fn admit<R: OwnedRecord>(&self, records: &[R]) -> Result<(), QuotaError> {
        if self.limit.is_none() {
            return Ok(());
        }
        QuotaEnforcer::require(self.quota_type, self.evaluate(records))
    }
}

/// Checks usage against plan limits
#[derive(Clone)]
pub struct QuotaEnforcer {
    store: RecordStore,
    seeds: SeedRegistry,
}

impl QuotaEnforcer {
    pub fn new(store: RecordStore) -> Self {
        Self::with_seeds(store, SeedRegistry::empty())
    }

    /// Exempts seed superadmins from all limits
    pub fn with_seeds(store: RecordStore, seeds: SeedRegistry) -> Self {
        QuotaEnforcer { store, seeds }
    }

    /// Limits governing `actor`
    pub async fn limits_for(&self, actor: &Actor) -> QuotaLimits {
        if self.seeds.contains(&actor.email) {
            return QuotaLimits::unlimited();
        }

        let catalog = PlanCatalog::load(&self.store).await;
        let tier = self.governing_tier(actor).await;
        QuotaLimits::for_plan(&catalog.get(tier))
    }

    async fn governing_tier(&self, actor: &Actor) -> PlanTier {
        if actor.role != ActorRole::User {
            return actor.plan;
        }

        match actor.admin_id.as_deref() {
            Some(org) => self
                .organization_admin(org)
                .await
                .map(|admin| admin.plan)
                .unwrap_or(actor.plan),
            None => actor.plan,
        }
    }

    async fn organization_admin(&self, organization: &str) -> Option<Actor> {
        Actor::list(&self.store).await.into_iter().find(|a| {
            a.role == ActorRole::Admin && a.organization_id.as_deref() == Some(organization)
        })
    }

    /// Captures the limit governing `actor` and the owners counted with it
    pub async fn guard(&self, actor: &Actor, quota_type: QuotaType) -> QuotaGuard {
        let limit = self.limits_for(actor).await.get(quota_type);
        let mut owners = HashSet::from([actor.id]);
        if let Some(organization) = actor.organization() {
            owners.extend(
                Actor::list_in_organization(&self.store, organization)
                    .await
                    .into_iter()
                    .map(|a| a.id),
            );
        }

        QuotaGuard {
            quota_type,
            limit,
            owners,
        }
    }

    /// Current usage against the limit
    pub async fn check(&self, actor: &Actor, quota_type: QuotaType) -> Result<QuotaCheckResult, QuotaError> {
        let Some(entity) = quota_type.entity() else {
            let org = actor
                .organization()
                .ok_or_else(|| QuotaError::OrganizationNotFound(actor.id.to_string()))?;
            return self.check_organization_users(org).await;
        };

        let guard = self.guard(actor, quota_type).await;
        let records: Vec<Document> = self.store.load(entity).await;
        Ok(guard.evaluate(records.as_slice()))
    }

    /// Whether an organization may take one more member
    pub async fn check_organization_users(&self, organization: &str) -> Result<QuotaCheckResult, QuotaError> {
        let admin = self
            .organization_admin(organization)
            .await
            .ok_or_else(|| QuotaError::OrganizationNotFound(organization.to_string()))?;

        let limit = self.limits_for(&admin).await.users;
        let current = Actor::list_in_organization(&self.store, organization).await.len() as u32;

        Ok(QuotaCheckResult::evaluate(current, limit))
    }

    /// Fails with `LimitExceeded` when the quota is used up
    pub async fn enforce(&self, actor: &Actor, quota_type: QuotaType) -> Result<(), QuotaError> {
        let result = self.check(actor, quota_type).await?;
        Self::require(quota_type, result)
    }

    pub async fn enforce_organization_users(&self, organization: &str) -> Result<(), QuotaError> {
        let result = self.check_organization_users(organization).await?;
        Self::require(QuotaType::Users, result)
    }

    fn require(quota_type: QuotaType, result: QuotaCheckResult) -> Result<(), QuotaError> {
        match (result.allowed, result.limit) {
            (false, Some(limit)) => Err(QuotaError::LimitExceeded {
                quota_type,
                limit,
                current: result.current,
            }),
            _ => Ok(()),
        }
    }

}
