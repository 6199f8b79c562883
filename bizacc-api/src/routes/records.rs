/// Generic owned collections
///
/// # Endpoints
///
/// - `GET /api/records/:entity` - Records of the collection the caller may see
/// - `POST /api/records/:entity` - Create a record owned by the caller
/// - `PUT /api/records/:entity/:id` - Replace a record's fields
/// - `DELETE /api/records/:entity/:id` - Delete a record
///
/// `:entity` is the storage key (`products`, `contacts`, `expenses`, ...).
/// Only owned collections are served. Invoices, quotations, and customers
/// can be read here but are written through their own endpoints, which
/// number documents and talk to the customer service.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::require,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use bizacc_shared::{
    auth::{
        policy::AccessRequirement,
        visibility::{can_modify, filter_visible},
    },
    models::{actor::ActorDirectory, record::Document},
    quota::{QuotaGuard, QuotaType},
    session::Session,
    store::EntityType,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct RecordListResponse {
    pub records: Vec<Document>,
    pub total: usize,
}

fn owned_entity(key: &str) -> ApiResult<EntityType> {
    EntityType::from_key(key)
        .filter(EntityType::is_owned)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown collection '{}'", key)))
}

fn writable_entity(key: &str) -> ApiResult<EntityType> {
    let entity = owned_entity(key)?;
    match entity {
        EntityType::Invoices | EntityType::Quotations | EntityType::Customers => Err(
            ApiError::BadRequest(format!("Use /api/{} to write {}", key.to_lowercase(), key)),
        ),
        _ => Ok(entity),
    }
}

/// List the records of `entity` visible to the caller
pub async fn list_records(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(entity): Path<String>,
) -> ApiResult<Json<RecordListResponse>> {
    require(&session, AccessRequirement::Approved)?;
    let entity = owned_entity(&entity)?;

    let directory = ActorDirectory::load(&state.store).await;
    let records: Vec<Document> = state.store.load(entity).await;
    let records = filter_visible(&session, records, &directory);

    Ok(Json(RecordListResponse {
        total: records.len(),
        records,
    }))
}

/// Create a record owned by the caller
///
/// `id` and `user_id` in the body are ignored. Contacts count against the
/// organization's contact limit, checked under the write.
///
/// # Errors
///
/// - `402 Payment Required`: Contact limit reached
/// - `409 Conflict`: Collection changed concurrently
pub async fn create_record(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(entity): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let actor = require(&session, AccessRequirement::Approved)?;
    let entity = writable_entity(&entity)?;

    let guard = match entity {
        EntityType::Contacts => state.quotas.guard(actor, QuotaType::Contacts).await,
        _ => QuotaGuard::unlimited(QuotaType::Contacts),
    };

    let document = Document::new(actor.id, fields);
    state
        .store
        .modify(entity, |records: &mut Vec<Document>| {
            guard.admit(records.as_slice())?;
            records.push(document.clone());
            Ok::<_, ApiError>(())
        })
        .await?;

    info!(entity = %entity, record_id = %document.id, "Record created");
    Ok((StatusCode::CREATED, Json(document)))
}

/// Replace the fields of a record, keeping its id and owner
pub async fn update_record(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((entity, id)): Path<(String, String)>,
    Json(mut fields): Json<Map<String, Value>>,
) -> ApiResult<Json<Document>> {
    require(&session, AccessRequirement::Approved)?;
    let entity = writable_entity(&entity)?;
    let directory = ActorDirectory::load(&state.store).await;

    fields.remove("id");
    fields.remove("user_id");

    let updated = state
        .store
        .modify(entity, |records: &mut Vec<Document>| {
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("Record {} not found", id)))?;

            if !can_modify(&session, record, &directory) {
                return Err(ApiError::forbidden("You cannot modify this record"));
            }

            record.fields = fields.clone();
            Ok(record.clone())
        })
        .await?;

    Ok(Json(updated))
}

/// Delete a record
pub async fn delete_record(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((entity, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    require(&session, AccessRequirement::Approved)?;
    let entity = owned_entity(&entity)?;
    let directory = ActorDirectory::load(&state.store).await;

    state
        .store
        .modify(entity, |records: &mut Vec<Document>| {
            let index = records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("Record {} not found", id)))?;

            if !can_modify(&session, &records[index], &directory) {
                return Err(ApiError::forbidden("You cannot delete this record"));
            }

            records.remove(index);
            Ok(())
        })
        .await?;

    info!(entity = %entity, record_id = %id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}
