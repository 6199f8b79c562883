/// Subscription plans and their limits
///
/// Every actor is assigned one [`PlanTier`]. The limits of the tier are
/// looked up in the [`PlanCatalog`], which starts from the built-in table
/// below and is overridden by whatever a superadmin saved in the `plans`
/// collection. Changes apply immediately; there is no plan history.
///
/// # Built-in plans
///
/// | Tier          | Price / month | Invoices  | Contacts  | Users     |
/// |---------------|---------------|-----------|-----------|-----------|
/// | Free          | ₹0            | 50        | 100       | 1         |
/// | Starter       | ₹499          | 500       | 1,000     | 3         |
/// | Professional  | ₹999          | 5,000     | 10,000    | 10        |
/// | Pro + POS     | ₹1,999        | 10,000    | 25,000    | 25        |
/// | Enterprise    | ₹4,999        | unlimited | unlimited | unlimited |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::store::{EntityType, RecordStore, StoreError};

/// Plan tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Starter,
    Professional,
    /// Professional plus point-of-sale
    ProPos,
    Enterprise,
}

impl PlanTier {
    pub const ALL: [PlanTier; 5] = [
        PlanTier::Free,
        PlanTier::Starter,
        PlanTier::Professional,
        PlanTier::ProPos,
        PlanTier::Enterprise,
    ];

    /// Converts tier to its stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Starter => "starter",
            PlanTier::Professional => "professional",
            PlanTier::ProPos => "pro_pos",
            PlanTier::Enterprise => "enterprise",
        }
    }

    /// Parses tier from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "free" => Some(PlanTier::Free),
            "starter" => Some(PlanTier::Starter),
            "professional" => Some(PlanTier::Professional),
            "pro_pos" | "pro+pos" => Some(PlanTier::ProPos),
            "enterprise" => Some(PlanTier::Enterprise),
            _ => None,
        }
    }
}

impl Default for PlanTier {
    fn default() -> Self {
        PlanTier::Free
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plan's price and limits
///
/// A `None` limit means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub tier: PlanTier,

    /// Display name
    pub name: String,

    /// Monthly price in paise
    pub price_paise: i64,

    pub max_invoices: Option<u32>,
    pub max_contacts: Option<u32>,
    pub max_users: Option<u32>,
}

impl Plan {
    /// The built-in definition of a tier
    pub fn builtin(tier: PlanTier) -> Self {
        let (name, price_paise, max_invoices, max_contacts, max_users) = match tier {
            PlanTier::Free => ("Free", 0, Some(50), Some(100), Some(1)),
            PlanTier::Starter => ("Starter", 49_900, Some(500), Some(1_000), Some(3)),
            PlanTier::Professional => {
                ("Professional", 99_900, Some(5_000), Some(10_000), Some(10))
            }
            PlanTier::ProPos => ("Pro + POS", 199_900, Some(10_000), Some(25_000), Some(25)),
            PlanTier::Enterprise => ("Enterprise", 499_900, None, None, None),
        };

        Plan {
            tier,
            name: name.to_string(),
            price_paise,
            max_invoices,
            max_contacts,
            max_users,
        }
    }
}

/// Effective plan definitions
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: HashMap<PlanTier, Plan>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self {
            plans: PlanTier::ALL
                .iter()
                .map(|tier| (*tier, Plan::builtin(*tier)))
                .collect(),
        }
    }
}

impl PlanCatalog {
    /// Built-in plans overridden by the stored `plans` collection
    pub async fn load(store: &RecordStore) -> Self {
        let mut catalog = Self::default();
        let stored: Vec<Plan> = store.load(EntityType::Plans).await;
        for plan in stored {
            catalog.plans.insert(plan.tier, plan);
        }
        catalog
    }

    /// Definition of a tier
    pub fn get(&self, tier: PlanTier) -> Plan {
        self.plans
            .get(&tier)
            .cloned()
            .unwrap_or_else(|| Plan::builtin(tier))
    }

    /// All plans, cheapest tier first
    pub fn all(&self) -> Vec<Plan> {
        PlanTier::ALL.iter().map(|tier| self.get(*tier)).collect()
    }

    /// Saves an override for one tier
    pub async fn upsert(store: &RecordStore, plan: Plan) -> Result<Plan, StoreError> {
        store
            .modify(EntityType::Plans, |plans: &mut Vec<Plan>| {
                plans.retain(|p| p.tier != plan.tier);
                plans.push(plan.clone());
                Ok::<_, StoreError>(())
            })
            .await?;

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_as_str_round_trip() {
        for tier in PlanTier::ALL {
            assert_eq!(PlanTier::from_str(tier.as_str()), Some(tier));
        }
        assert_eq!(PlanTier::from_str("pro+pos"), Some(PlanTier::ProPos));
        assert_eq!(PlanTier::from_str("gold"), None);
    }

    #[test]
    fn test_builtin_limits() {
        let free = Plan::builtin(PlanTier::Free);
        assert_eq!(free.max_invoices, Some(50));
        assert_eq!(free.max_users, Some(1));
        assert_eq!(free.price_paise, 0);

        let enterprise = Plan::builtin(PlanTier::Enterprise);
        assert_eq!(enterprise.max_invoices, None);
        assert_eq!(enterprise.max_contacts, None);
    }

    #[test]
    fn test_default_tier_is_free() {
        assert_eq!(PlanTier::default(), PlanTier::Free);
    }

    #[tokio::test]
    async fn test_stored_override_takes_effect_immediately() {
        let store = RecordStore::memory();
        let before = PlanCatalog::load(&store).await;
        assert_eq!(before.get(PlanTier::Starter).max_invoices, Some(500));

        let mut starter = Plan::builtin(PlanTier::Starter);
        starter.max_invoices = Some(750);
        PlanCatalog::upsert(&store, starter).await.unwrap();

        let after = PlanCatalog::load(&store).await;
        assert_eq!(after.get(PlanTier::Starter).max_invoices, Some(750));
        assert_eq!(after.all().len(), 5);
    }
}
