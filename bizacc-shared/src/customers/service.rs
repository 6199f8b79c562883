/// Customer reads and writes with local fallback
///
/// With a remote backend configured, writes go to it first. If it is
/// unavailable the customer is kept in the local `customers` collection
/// and the caller is told so through the `fallback` flag. Listings merge
/// remote rows with local-only ones, so nothing saved during an outage
/// disappears from view.
///
/// Without a remote backend the local collection is the only store.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::{CustomerBackend, CustomerError};
use crate::auth::visibility::{can_modify, filter_visible};
use crate::models::actor::ActorDirectory;
use crate::models::customer::{Customer, CustomerInput};
use crate::session::Session;
use crate::store::{EntityType, RecordStore};

/// Shown when the remote service could not be used
pub const FALLBACK_NOTICE: &str =
    "Customer service is unavailable; showing customers saved on this server";

/// Customers visible to the caller
#[derive(Debug, Clone)]
pub struct CustomerListing {
    pub customers: Vec<Customer>,

    /// True when the remote service could not be read
    pub fallback: bool,

    pub notice: Option<&'static str>,
}

/// A stored customer and where it ended up
#[derive(Debug, Clone)]
pub struct SavedCustomer {
    pub customer: Customer,

    /// True when it was saved locally because the remote failed
    pub fallback: bool,
}

#[derive(Clone)]
pub struct CustomerService {
    remote: Option<Arc<dyn CustomerBackend>>,
    store: RecordStore,
}

impl CustomerService {
    pub fn new(store: RecordStore, remote: Option<Arc<dyn CustomerBackend>>) -> Self {
        Self { remote, store }
    }

    /// A service that only uses the local collection
    pub fn local(store: RecordStore) -> Self {
        Self::new(store, None)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Creates a customer owned by the session's actor
    pub async fn create(&self, session: &Session, input: CustomerInput) -> Result<SavedCustomer, CustomerError> {
        let actor = session.current_actor().ok_or(CustomerError::NoActor)?;
        if input.name.trim().is_empty() {
            return Err(CustomerError::EmptyName);
        }
        let customer = Customer::new(actor.id, input);

        if let Some(remote) = &self.remote {
            match remote.insert(&customer).await {
                Ok(saved) => {
                    info!(id = %saved.id, backend = remote.name(), "Customer created");
                    return Ok(SavedCustomer {
                        customer: saved,
                        fallback: false,
                    });
                }
                Err(e) if e.is_unavailable() => {
                    warn!(error = %e, "Customer service unavailable, saving locally");
                }
                Err(e) => return Err(e),
            }
        }

        self.store.append(EntityType::Customers, &customer).await?;
        Ok(SavedCustomer {
            fallback: self.remote.is_some(),
            customer,
        })
    }

    /// Customers the session may see, newest first
    pub async fn list(&self, session: &Session, directory: &ActorDirectory) -> CustomerListing {
        let local: Vec<Customer> = self.store.load(EntityType::Customers).await;

        let (mut customers, fallback) = match &self.remote {
            None => (local, false),
            Some(remote) => match remote.list().await {
                Ok(rows) => (merge(rows, local), false),
                Err(e) => {
                    warn!(error = %e, "Customer service unavailable, listing local customers");
                    (local, true)
                }
            },
        };

        customers.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        CustomerListing {
            customers: filter_visible(session, customers, directory),
            fallback,
            notice: fallback.then_some(FALLBACK_NOTICE),
        }
    }

    /// Replaces the editable fields of customer `id`
    ///
    /// With a remote configured the edit goes there first, including for
    /// rows that only have a local copy from an earlier outage; once the
    /// remote accepts it the local copy is dropped. If the remote is
    /// unavailable the edited row is kept locally and shadows the remote
    /// one in listings.
    pub async fn update(
        &self,
        session: &Session,
        directory: &ActorDirectory,
        id: &str,
        input: CustomerInput,
    ) -> Result<SavedCustomer, CustomerError> {
        if input.name.trim().is_empty() {
            return Err(CustomerError::EmptyName);
        }

        let local: Vec<Customer> = self.store.load(EntityType::Customers).await;
        let local_copy = local.into_iter().find(|c| c.id == id);
        let is_local = local_copy.is_some();

        let existing = match local_copy {
            Some(customer) => customer,
            None => self.find_remote(id).await?,
        };

        if !can_modify(session, &existing, directory) {
            return Err(CustomerError::Forbidden(id.to_string()));
        }

        let mut updated = existing;
        updated.apply(input);

        if let Some(remote) = &self.remote {
            if let Some(saved) = self.push_remote(remote.as_ref(), &updated, is_local).await? {
                if is_local {
                    self.drop_local(id).await?;
                }
                return Ok(SavedCustomer {
                    customer: saved,
                    fallback: false,
                });
            }
        }

        let row = updated.clone();
        self.store
            .modify(EntityType::Customers, |customers: &mut Vec<Customer>| {
                match customers.iter_mut().find(|c| c.id == row.id) {
                    Some(slot) => *slot = row.clone(),
                    None => customers.push(row.clone()),
                }
                Ok::<_, CustomerError>(())
            })
            .await?;

        Ok(SavedCustomer {
            customer: updated,
            fallback: self.remote.is_some(),
        })
    }

    /// Writes `customer` to the remote; `None` when the remote is down
    ///
    /// A local-only row the remote has never seen is inserted.
    async fn push_remote(
        &self,
        remote: &dyn CustomerBackend,
        customer: &Customer,
        is_local: bool,
    ) -> Result<Option<Customer>, CustomerError> {
        let result = match remote.update(&customer.id, customer).await {
            Err(CustomerError::NotFound(_)) if is_local => remote.insert(customer).await,
            other => other,
        };

        match result {
            Ok(saved) => {
                info!(id = %saved.id, backend = remote.name(), "Customer updated");
                Ok(Some(saved))
            }
            Err(e) if e.is_unavailable() => {
                warn!(id = %customer.id, error = %e, "Customer service unavailable, keeping edit locally");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn drop_local(&self, id: &str) -> Result<(), CustomerError> {
        self.store
            .modify(EntityType::Customers, |customers: &mut Vec<Customer>| {
                customers.retain(|c| c.id != id);
                Ok::<_, CustomerError>(())
            })
            .await
    }

    async fn find_remote(&self, id: &str) -> Result<Customer, CustomerError> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| CustomerError::NotFound(id.to_string()))?;

        remote
            .list()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CustomerError::NotFound(id.to_string()))
    }
}

/// Remote rows plus local rows the remote does not know; local copies win
/// over remote rows with the same id
fn merge(remote: Vec<Customer>, local: Vec<Customer>) -> Vec<Customer> {
    let local_ids: HashSet<String> = local.iter().map(|c| c.id.clone()).collect();
    remote
        .into_iter()
        .filter(|c| !local_ids.contains(&c.id))
        .chain(local)
        .collect()
}
