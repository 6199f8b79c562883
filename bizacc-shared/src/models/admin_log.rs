/// Administrative audit log
///
/// One entry per administrative action (approvals, suspensions, plan
/// changes, reconciliation runs), appended to `adminLogs`. Entries are never
/// updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{EntityType, RecordStore, StoreError};

/// Kinds of logged actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    Approve,
    Reject,
    Suspend,
    Reinstate,
    ChangePlan,
    UpdatePlanDefinition,
    Reconcile,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::Approve => "approve",
            AdminAction::Reject => "reject",
            AdminAction::Suspend => "suspend",
            AdminAction::Reinstate => "reinstate",
            AdminAction::ChangePlan => "change_plan",
            AdminAction::UpdatePlanDefinition => "update_plan_definition",
            AdminAction::Reconcile => "reconcile",
        }
    }
}

/// An audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminLog {
    pub id: Uuid,

    /// Actor who performed the action
    pub admin_id: Uuid,

    pub action: AdminAction,

    /// Actor acted on, if any
    #[serde(default)]
    pub target_id: Option<Uuid>,

    /// Action-specific detail
    #[serde(default)]
    pub details: Value,

    pub created_at: DateTime<Utc>,
}

impl AdminLog {
    pub fn new(admin_id: Uuid, action: AdminAction, target_id: Option<Uuid>, details: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            admin_id,
            action,
            target_id,
            details,
            created_at: Utc::now(),
        }
    }

    /// Appends an entry to `adminLogs`
    pub async fn record(store: &RecordStore, entry: AdminLog) -> Result<AdminLog, StoreError> {
        store
            .modify(EntityType::AdminLogs, |logs: &mut Vec<Value>| {
                logs.push(serde_json::to_value(&entry)?);
                Ok::<_, StoreError>(())
            })
            .await?;
        Ok(entry)
    }

    /// Entries, newest first
    pub async fn list(store: &RecordStore, limit: usize) -> Vec<AdminLog> {
        let mut logs: Vec<AdminLog> = store.load(EntityType::AdminLogs).await;
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        logs.truncate(limit);
        logs
    }
}
