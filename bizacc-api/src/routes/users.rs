/// User management endpoints
///
/// # Endpoints
///
/// - `GET /api/users` - Actors the caller administers
/// - `POST /api/users/:id/approve` - pending → approved
/// - `POST /api/users/:id/reject` - pending → rejected
/// - `POST /api/users/:id/suspend` - approved → suspended
/// - `POST /api/users/:id/reinstate` - suspended → approved
/// - `PUT /api/users/:id/plan` - Move an actor to another plan
///
/// Superadmins manage everyone; admins manage the users of their own
/// organization. Seed superadmins cannot be acted on, and nobody can act on
/// themselves.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::require,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use bizacc_shared::{
    auth::{policy::AccessRequirement, workflow},
    models::{
        actor::{Actor, PublicActor},
        plan::PlanTier,
    },
    session::Session,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<PublicActor>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub plan: String,
}

/// List actors visible to the caller, newest first
pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<UserListResponse>> {
    let actor = require(&session, AccessRequirement::Admin)?;

    let mut actors = if session.is_superadmin() {
        Actor::list(&state.store).await
    } else {
        match actor.organization() {
            Some(org) => Actor::list_in_organization(&state.store, org).await,
            None => Vec::new(),
        }
    };
    actors.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let users: Vec<PublicActor> = actors.iter().map(PublicActor::from).collect();
    Ok(Json(UserListResponse {
        total: users.len(),
        users,
    }))
}

pub async fn approve_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicActor>> {
    let actor = workflow::approve(&state.store, &session, id).await?;
    Ok(Json(PublicActor::from(&actor)))
}

pub async fn reject_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicActor>> {
    let actor = workflow::reject(&state.store, &session, id).await?;
    Ok(Json(PublicActor::from(&actor)))
}

pub async fn suspend_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicActor>> {
    let actor = workflow::suspend(&state.store, &session, id).await?;
    Ok(Json(PublicActor::from(&actor)))
}

pub async fn reinstate_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublicActor>> {
    let actor = workflow::reinstate(&state.store, &session, id).await?;
    Ok(Json(PublicActor::from(&actor)))
}

/// Change an actor's plan; effective immediately
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Unknown plan tier
pub async fn change_user_plan(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangePlanRequest>,
) -> ApiResult<Json<PublicActor>> {
    let tier = PlanTier::from_str(&req.plan)
        .ok_or_else(|| ApiError::invalid("plan", format!("Unknown plan '{}'", req.plan)))?;

    let actor = workflow::change_plan(&state.store, &session, id, tier).await?;
    Ok(Json(PublicActor::from(&actor)))
}
