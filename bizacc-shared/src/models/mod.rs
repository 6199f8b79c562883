/// Domain models for BizAcc
///
/// Every model is persisted as records in a [`crate::store::RecordStore`]
/// collection and exposes its operations as associated functions taking
/// the store.
///
/// # Models
///
/// - `actor`: superadmins, admins, and users with their approval status
/// - `plan`: subscription tiers and their limits
/// - `record`: the owned-record contract and the generic document
/// - `invoice`: invoices and quotations with GST totals
/// - `customer`: customers, local mirror of the external table
/// - `admin_log`: audit trail of administrative actions
/// - `subscription`: plan change history
/// - `password_reset`: hashed single-use reset tokens
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
/// let actor = Actor::create(&store, NewActor {
///     email: "owner@acme.in".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: None,
///     role: ActorRole::Admin,
///     organization_id: None,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod actor;
pub mod admin_log;
pub mod customer;
pub mod invoice;
pub mod password_reset;
pub mod plan;
pub mod record;
pub mod subscription;
