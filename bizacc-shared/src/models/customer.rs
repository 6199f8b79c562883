/// Customer model
///
/// Mirrors the columns of the external `customers` table. The same shape is
/// kept in the local `customers` collection when the external backend is
/// unreachable.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE customers (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL,
///     name TEXT NOT NULL,
///     email TEXT,
///     phone TEXT,
///     gst_number TEXT,
///     address TEXT,
///     city TEXT,
///     state TEXT,
///     pincode TEXT,
///     notes TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{lenient_id, lenient_owner, new_record_id, OwnedRecord};

/// A customer of an actor's business
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default = "new_record_id", deserialize_with = "lenient_id")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_owner")]
    pub user_id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    #[serde(default)]
    pub gst_number: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub pincode: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Customer fields supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Customer {
    /// A new customer owned by `owner`
    pub fn new(owner: Uuid, input: CustomerInput) -> Self {
        let mut customer = Self {
            id: new_record_id(),
            user_id: Some(owner.to_string()),
            name: String::new(),
            email: None,
            phone: None,
            gst_number: None,
            address: None,
            city: None,
            state: None,
            pincode: None,
            notes: None,
            created_at: Utc::now(),
        };
        customer.apply(input);
        customer
    }

    /// Overwrites the editable fields
    pub fn apply(&mut self, input: CustomerInput) {
        self.name = input.name;
        self.email = input.email;
        self.phone = input.phone;
        self.gst_number = input.gst_number.map(|g| g.trim().to_uppercase());
        self.address = input.address;
        self.city = input.city;
        self.state = input.state;
        self.pincode = input.pincode;
        self.notes = input.notes;
    }
}

impl OwnedRecord for Customer {
    fn record_id(&self) -> String {
        self.id.clone()
    }

    fn owner_ref(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn set_owner(&mut self, owner: Uuid) {
        self.user_id = Some(owner.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_customer_normalizes_gst_number() {
        let owner = Uuid::new_v4();
        let customer = Customer::new(
            owner,
            CustomerInput {
                name: "Sharma Traders".into(),
                gst_number: Some(" 27aapfu0939f1zv ".into()),
                ..Default::default()
            },
        );
        assert_eq!(customer.gst_number.as_deref(), Some("27AAPFU0939F1ZV"));
        assert_eq!(customer.owner_id(), Some(owner));
    }

    #[test]
    fn test_reads_rest_rows() {
        let row = serde_json::json!({
            "id": "c1",
            "user_id": "7f3c9a2e-0000-4000-8000-000000000001",
            "name": "Acme",
            "city": "Pune",
            "created_at": "2024-01-05T10:00:00Z"
        });
        let customer: Customer = serde_json::from_value(row).unwrap();
        assert_eq!(customer.city.as_deref(), Some("Pune"));
        assert!(customer.owner_id().is_some());
    }
}
