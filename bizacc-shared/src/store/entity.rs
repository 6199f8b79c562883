/// Persisted collection names
///
/// Every entity type maps to exactly one key in the record store. The key
/// strings are part of the persisted format and must never change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity types with their own collection in the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    /// The current actor of a single-profile session (single object, not an array)
    User,
    AllUsers,
    Invoices,
    Quotations,
    Contacts,
    Products,
    PurchaseOrders,
    Warehouses,
    Subscriptions,
    CreditNotes,
    EInvoices,
    SalesOrders,
    ProformaInvoices,
    Plans,
    AdminLogs,
    Expenses,
    /// Local copy of the external customer table
    Customers,
    /// Hashed password reset tokens
    PasswordResets,
}

impl EntityType {
    /// All entity types, in a stable order
    pub const ALL: [EntityType; 18] = [
        EntityType::User,
        EntityType::AllUsers,
        EntityType::Invoices,
        EntityType::Quotations,
        EntityType::Contacts,
        EntityType::Products,
        EntityType::PurchaseOrders,
        EntityType::Warehouses,
        EntityType::Subscriptions,
        EntityType::CreditNotes,
        EntityType::EInvoices,
        EntityType::SalesOrders,
        EntityType::ProformaInvoices,
        EntityType::Plans,
        EntityType::AdminLogs,
        EntityType::Expenses,
        EntityType::Customers,
        EntityType::PasswordResets,
    ];

    /// Storage key for this collection
    pub fn key(&self) -> &'static str {
        match self {
            EntityType::User => "user",
            EntityType::AllUsers => "allUsers",
            EntityType::Invoices => "invoices",
            EntityType::Quotations => "quotations",
            EntityType::Contacts => "contacts",
            EntityType::Products => "products",
            EntityType::PurchaseOrders => "purchaseOrders",
            EntityType::Warehouses => "warehouses",
            EntityType::Subscriptions => "subscriptions",
            EntityType::CreditNotes => "creditNotes",
            EntityType::EInvoices => "eInvoices",
            EntityType::SalesOrders => "salesOrders",
            EntityType::ProformaInvoices => "proformaInvoices",
            EntityType::Plans => "plans",
            EntityType::AdminLogs => "adminLogs",
            EntityType::Expenses => "expenses",
            EntityType::Customers => "customers",
            EntityType::PasswordResets => "passwordResets",
        }
    }

    /// Parses an entity type from its storage key
    pub fn from_key(key: &str) -> Option<Self> {
        EntityType::ALL.iter().copied().find(|e| e.key() == key)
    }

    /// Whether records of this type carry a `user_id` owner reference
    pub fn is_owned(&self) -> bool {
        !matches!(
            self,
            EntityType::User
                | EntityType::AllUsers
                | EntityType::Plans
                | EntityType::AdminLogs
                | EntityType::PasswordResets
        )
    }

    /// Whether the key holds a single object rather than an array
    pub fn is_single_object(&self) -> bool {
        matches!(self, EntityType::User)
    }

    /// Owned entity types, the default scope of a reconciliation run
    pub fn owned_types() -> Vec<EntityType> {
        EntityType::ALL
            .iter()
            .copied()
            .filter(EntityType::is_owned)
            .collect()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
