/// Ownership reconciliation
///
/// Records written by older clients can carry an owner reference that
/// points at nobody: a missing `user_id`, a numeric id from a local
/// profile, or an actor that has since been removed. [`Reconciler`] walks
/// the owned collections and hands every such orphan to the current actor.
///
/// A run is idempotent. After one pass every record in the scanned
/// collections resolves to a known actor, so a second pass rewrites
/// nothing. Collections are reconciled one at a time and each write is a
/// compare-and-set, so an interrupted run can simply be started again.
///
/// # Example
///
/// ```no_run
/// use bizacc_shared::migration::Reconciler;
/// use bizacc_shared::session::Session;
/// use bizacc_shared::store::{EntityType, RecordStore};
///
/// # async fn example(store: RecordStore, session: Session) -> Result<(), Box<dyn std::error::Error>> {
/// let report = Reconciler::new(store)
///     .reconcile(&session, &EntityType::owned_types())
///     .await?;
/// println!("rewrote {} records", report.total_rewritten());
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::actor::Actor;
use crate::models::admin_log::{AdminAction, AdminLog};
use crate::models::record::{Document, OwnedRecord};
use crate::session::Session;
use crate::store::{EntityType, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Reconciliation requires a signed-in actor")]
    NoActor,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Counts for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityReport {
    pub entity: EntityType,
    pub scanned: usize,
    pub rewritten: usize,
}

/// Outcome of a reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Actor that received the orphans
    pub actor_id: Uuid,

    pub entities: Vec<EntityReport>,

    /// Requested types that carry no owner and were left alone
    pub skipped: Vec<EntityType>,
}

impl ReconcileReport {
    pub fn total_scanned(&self) -> usize {
        self.entities.iter().map(|e| e.scanned).sum()
    }

    pub fn total_rewritten(&self) -> usize {
        self.entities.iter().map(|e| e.rewritten).sum()
    }
}

pub struct Reconciler {
    store: RecordStore,
}

impl Reconciler {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Reassigns orphaned records in `entities` to the session's actor
    ///
    /// A record is orphaned when its owner reference does not parse as the
    /// id of an actor in `allUsers` or of the current actor.
    ///
    /// # Errors
    ///
    /// Fails without rewriting anything when `allUsers` cannot be read,
    /// and stops at the first collection that cannot be read.
    pub async fn reconcile(
        &self,
        session: &Session,
        entities: &[EntityType],
    ) -> Result<ReconcileReport, ReconcileError> {
        let actor = session.current_actor().ok_or(ReconcileError::NoActor)?;

        let directory = self
            .store
            .load_snapshot::<Actor>(EntityType::AllUsers)
            .await
            .inspect_err(|e| warn!(error = %e, "Actor directory unreadable, not reconciling"))?;
        let mut known: HashSet<Uuid> = directory.records.into_iter().map(|a| a.id).collect();
        known.insert(actor.id);

        let mut report = ReconcileReport {
            actor_id: actor.id,
            entities: Vec::new(),
            skipped: Vec::new(),
        };

        for &entity in entities {
            if !entity.is_owned() {
                debug!(entity = %entity, "Skipping collection without owners");
                report.skipped.push(entity);
                continue;
            }

            let counts = self.reconcile_entity(entity, actor.id, &known).await?;
            if counts.rewritten > 0 {
                info!(
                    entity = %entity,
                    scanned = counts.scanned,
                    rewritten = counts.rewritten,
                    "Reassigned orphaned records"
                );
            }
            report.entities.push(counts);
        }

        AdminLog::record(
            &self.store,
            AdminLog::new(
                actor.id,
                AdminAction::Reconcile,
                None,
                json!({
                    "scanned": report.total_scanned(),
                    "rewritten": report.total_rewritten(),
                    "entities": report.entities,
                }),
            ),
        )
        .await?;

        Ok(report)
    }

    async fn reconcile_entity(
        &self,
        entity: EntityType,
        actor_id: Uuid,
        known: &HashSet<Uuid>,
    ) -> Result<EntityReport, ReconcileError> {
        let result = self
            .store
            .modify(entity, |records: &mut Vec<Document>| {
                let mut rewritten = 0;
                for record in records.iter_mut() {
                    let resolves = record.owner_id().is_some_and(|id| known.contains(&id));
                    if !resolves {
                        record.set_owner(actor_id);
                        rewritten += 1;
                    }
                }
                Ok::<_, StoreError>(EntityReport {
                    entity,
                    scanned: records.len(),
                    rewritten,
                })
            })
            .await;

        result.map_err(|e| {
            warn!(entity = %entity, error = %e, "Reconciliation of collection failed");
            ReconcileError::Store(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::actor::{ActorRole, NewActor, SeedRegistry};
    use crate::store::{MemoryBackend, StoreBackend};
    use serde_json::Value;
    use std::sync::Arc;

    async fn session_for(store: &RecordStore, email: &str) -> Session {
        let actor = Actor::create(
            store,
            NewActor {
                email: email.into(),
                password_hash: String::new(),
                name: None,
                role: ActorRole::Admin,
                organization_id: None,
            },
        )
        .await
        .unwrap();
        Session::for_actor(actor, Arc::new(SeedRegistry::empty()))
    }

    #[tokio::test]
    async fn test_orphans_are_reassigned() {
        let store = RecordStore::memory();
        let session = session_for(&store, "owner@acme.in").await;
        let other = session_for(&store, "other@acme.in").await;
        let other_id = other.actor_id().unwrap().to_string();

        store
            .save(
                EntityType::Products,
                &[
                    json!({"id": "p1", "name": "Tea"}),
                    json!({"id": "p2", "user_id": "42"}),
                    json!({"id": "p3", "user_id": other_id}),
                    json!({"id": "p4", "user_id": Uuid::new_v4().to_string()}),
                ],
            )
            .await
            .unwrap();

        let report = Reconciler::new(store.clone())
            .reconcile(&session, &[EntityType::Products])
            .await
            .unwrap();

        assert_eq!(report.total_scanned(), 4);
        assert_eq!(report.total_rewritten(), 3);

        let owner = session.actor_id().unwrap().to_string();
        let records: Vec<Document> = store.load(EntityType::Products).await;
        let owners: Vec<_> = records.iter().map(|r| r.user_id.clone().unwrap()).collect();
        assert_eq!(owners, vec![owner.clone(), owner.clone(), other_id, owner]);
        assert_eq!(records[0].fields.get("name"), Some(&Value::from("Tea")));
    }

    #[tokio::test]
    async fn test_second_run_rewrites_nothing() {
        let store = RecordStore::memory();
        let session = session_for(&store, "owner@acme.in").await;
        store
            .save(EntityType::Invoices, &[json!({"id": 1}), json!({"id": 2, "user_id": "x"})])
            .await
            .unwrap();

        let reconciler = Reconciler::new(store.clone());
        let first = reconciler.reconcile(&session, &[EntityType::Invoices]).await.unwrap();
        let after_first: Vec<Document> = store.load(EntityType::Invoices).await;

        let second = reconciler.reconcile(&session, &[EntityType::Invoices]).await.unwrap();
        let after_second: Vec<Document> = store.load(EntityType::Invoices).await;

        assert_eq!(first.total_rewritten(), 2);
        assert_eq!(second.total_rewritten(), 0);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_unowned_types_are_skipped() {
        let store = RecordStore::memory();
        let session = session_for(&store, "owner@acme.in").await;

        let report = Reconciler::new(store.clone())
            .reconcile(&session, &[EntityType::AllUsers, EntityType::Plans, EntityType::Contacts])
            .await
            .unwrap();

        assert_eq!(report.skipped, vec![EntityType::AllUsers, EntityType::Plans]);
        assert_eq!(report.entities.len(), 1);

        let logs = AdminLog::list(&store, 10).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AdminAction::Reconcile);
    }

    #[tokio::test]
    async fn test_unreadable_actor_directory_aborts() {
        let backend = MemoryBackend::new();
        let store = RecordStore::new(Arc::new(backend.clone()));
        let owner = session_for(&store, "owner@acme.in").await;
        let thief = session_for(&store, "thief@other.in").await;
        let owner_id = owner.actor_id().unwrap().to_string();
        store
            .save(EntityType::Invoices, &[json!({"id": "i1", "user_id": owner_id})])
            .await
            .unwrap();

        let mut actors: Vec<Value> = store.load(EntityType::AllUsers).await;
        actors.push(json!({"id": "legacy", "email": "l@x.in"}));
        store.save(EntityType::AllUsers, &actors).await.unwrap();

        let result = Reconciler::new(store.clone())
            .reconcile(&thief, &[EntityType::Invoices])
            .await;
        assert!(matches!(result, Err(ReconcileError::Store(StoreError::Corrupt { .. }))));

        let invoices: Vec<Document> = store.load(EntityType::Invoices).await;
        assert_eq!(invoices[0].user_id.as_deref(), Some(owner_id.as_str()));
        assert!(AdminLog::list(&store, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_collection_is_left_intact() {
        let backend = MemoryBackend::new();
        let store = RecordStore::new(Arc::new(backend.clone()));
        let session = session_for(&store, "owner@acme.in").await;
        backend
            .insert_raw("bizacc:products", r#"{"schema_version":1,"records":[{"id":"p1"},null]}"#)
            .await;

        let result = Reconciler::new(store.clone())
            .reconcile(&session, &[EntityType::Products])
            .await;
        assert!(matches!(result, Err(ReconcileError::Store(StoreError::Corrupt { .. }))));

        let raw = backend.get("bizacc:products").await.unwrap().unwrap();
        assert!(raw.value.contains("\"p1\""));
        assert_eq!(raw.version, 1);
    }

    #[tokio::test]
    async fn test_anonymous_session_is_rejected() {
        let session = Session::anonymous(Arc::new(SeedRegistry::empty()));
        let result = Reconciler::new(RecordStore::memory())
            .reconcile(&session, &EntityType::owned_types())
            .await;
        assert!(matches!(result, Err(ReconcileError::NoActor)));
    }
}
