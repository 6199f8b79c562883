/// Administrative endpoints
///
/// # Endpoints
///
/// - `POST /api/admin/reconcile` - Hand orphaned records to the caller
/// - `GET /api/admin/logs` - Audit trail, newest first

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::require,
};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use bizacc_shared::{
    auth::policy::AccessRequirement,
    migration::{ReconcileReport, Reconciler},
    models::{
        actor::{Actor, ActorDirectory},
        admin_log::AdminLog,
    },
    session::Session,
    store::EntityType,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileRequest {
    /// Collection keys to scan; every owned collection when omitted
    #[serde(default)]
    pub entities: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LogListResponse {
    pub logs: Vec<AdminLog>,
    pub total: usize,
}

/// Reassign records whose owner is unknown to the caller
///
/// Safe to repeat; a second run rewrites nothing.
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    body: Option<Json<ReconcileRequest>>,
) -> ApiResult<Json<ReconcileReport>> {
    require(&session, AccessRequirement::Approved)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let entities = match req.entities {
        None => EntityType::owned_types(),
        Some(keys) => keys
            .iter()
            .map(|key| {
                EntityType::from_key(key)
                    .ok_or_else(|| ApiError::invalid("entities", format!("Unknown collection '{}'", key)))
            })
            .collect::<ApiResult<Vec<_>>>()?,
    };

    let report = Reconciler::new(state.store.clone())
        .reconcile(&session, &entities)
        .await?;
    Ok(Json(report))
}

/// Audit entries the caller may see
///
/// Superadmins see every entry. Admins see entries they wrote and entries
/// about members of their organization.
pub async fn list_logs(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogListResponse>> {
    let actor = require(&session, AccessRequirement::Admin)?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);

    let logs = if session.is_superadmin() {
        AdminLog::list(&state.store, limit).await
    } else {
        let directory = ActorDirectory::load(&state.store).await;
        let organization = actor.organization();
        let in_organization = |id: Uuid| {
            directory
                .get(id)
                .and_then(Actor::organization)
                .is_some_and(|org| Some(org) == organization)
        };

        AdminLog::list(&state.store, usize::MAX)
            .await
            .into_iter()
            .filter(|log| log.admin_id == actor.id || log.target_id.is_some_and(in_organization))
            .take(limit)
            .collect()
    };

    Ok(Json(LogListResponse {
        total: logs.len(),
        logs,
    }))
}
