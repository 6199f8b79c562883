/// Customer directory
///
/// Customers are the one collection that may live in an external
/// PostgREST-style service instead of the record store. The remote side is
/// reached through the [`CustomerBackend`] trait; [`service::CustomerService`]
/// writes through to it and keeps working from the local `customers`
/// collection whenever it cannot be reached.
///
/// # Modules
///
/// - [`rest`]: HTTP implementation of [`CustomerBackend`]
/// - [`service`]: fallback and merge logic used by the API

pub mod rest;
pub mod service;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::customer::Customer;
use crate::store::StoreError;

pub use rest::{RestConfig, RestCustomerBackend};
pub use service::{CustomerListing, CustomerService, SavedCustomer};

#[derive(Debug, Error)]
pub enum CustomerError {
    #[error("Remote customer service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Remote customer service unreachable: {0}")]
    Transport(String),

    #[error("Invalid response from customer service: {0}")]
    Decode(String),

    #[error("Customer not found: {0}")]
    NotFound(String),

    #[error("Not allowed to change customer {0}")]
    Forbidden(String),

    #[error("Customer name must not be empty")]
    EmptyName,

    #[error("No signed-in actor")]
    NoActor,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CustomerError {
    /// Failures worth retrying or falling back from
    pub fn is_unavailable(&self) -> bool {
        match self {
            CustomerError::Transport(_) => true,
            CustomerError::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Remote customer storage
#[async_trait]
pub trait CustomerBackend: Send + Sync {
    /// Inserts a customer and returns the stored row
    async fn insert(&self, customer: &Customer) -> Result<Customer, CustomerError>;

    /// All customers, newest first
    async fn list(&self) -> Result<Vec<Customer>, CustomerError>;

    /// Replaces the row with `id`
    async fn update(&self, id: &str, customer: &Customer) -> Result<Customer, CustomerError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
