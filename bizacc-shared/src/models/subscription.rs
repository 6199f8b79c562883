/// Plan subscription history
///
/// A [`Subscription`] is appended to `subscriptions` whenever an actor's
/// plan changes. The actor record itself carries only the current tier; this
/// collection is the trail of who moved to which tier and when.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::plan::{Plan, PlanTier};
use super::record::{lenient_id, lenient_owner, new_record_id, OwnedRecord};
use crate::store::{EntityType, RecordStore, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default = "new_record_id", deserialize_with = "lenient_id")]
    pub id: String,

    /// Subscribed actor
    #[serde(default, deserialize_with = "lenient_owner")]
    pub user_id: Option<String>,

    pub plan: PlanTier,

    #[serde(default)]
    pub previous_plan: Option<PlanTier>,

    /// Price at the time of the change
    pub price_paise: i64,

    /// Who made the change
    #[serde(default)]
    pub changed_by: Option<Uuid>,

    pub started_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(actor_id: Uuid, plan: &Plan, previous_plan: Option<PlanTier>, changed_by: Uuid) -> Self {
        Self {
            id: new_record_id(),
            user_id: Some(actor_id.to_string()),
            plan: plan.tier,
            previous_plan,
            price_paise: plan.price_paise,
            changed_by: Some(changed_by),
            started_at: Utc::now(),
        }
    }

    pub async fn record(store: &RecordStore, subscription: Subscription) -> Result<Subscription, StoreError> {
        store
            .modify(EntityType::Subscriptions, |subs: &mut Vec<Value>| {
                subs.push(serde_json::to_value(&subscription)?);
                Ok::<_, StoreError>(())
            })
            .await?;
        Ok(subscription)
    }

    /// An actor's subscription history, oldest first
    pub async fn history(store: &RecordStore, actor_id: Uuid) -> Vec<Subscription> {
        let mut subs: Vec<Subscription> = store
            .load::<Subscription>(EntityType::Subscriptions)
            .await
            .into_iter()
            .filter(|s| s.owner_id() == Some(actor_id))
            .collect();
        subs.sort_by_key(|s| s.started_at);
        subs
    }
}

impl OwnedRecord for Subscription {
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
