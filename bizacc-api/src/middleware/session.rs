/// Session middleware
///
/// Resolves the caller for every request and stores a
/// [`Session`] in the request extensions. A missing `Authorization` header
/// gives an anonymous session; handlers decide through [`require`] whether
/// that is acceptable. A header that is present but invalid is rejected
/// with `401` at once.
///
/// Tokens only identify the actor. Role, status, and organization are read
/// from `allUsers` on each request, so approvals and suspensions take
/// effect without re-issuing tokens.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use bizacc_shared::auth::jwt;
use bizacc_shared::auth::policy::{evaluate, AccessRequirement};
use bizacc_shared::models::actor::Actor;
use bizacc_shared::session::Session;
use tracing::debug;

use crate::{app::AppState, error::ApiError};

/// Attaches a [`Session`] to the request
pub async fn session_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = match req.headers().get(header::AUTHORIZATION) {
        None => Session::anonymous(state.seeds.clone()),
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

            let claims = jwt::validate_access_token(token, state.jwt_secret())?;
            let session = Session::resolve(&state.store, claims.sub, state.seeds.clone()).await;
            if session.current_actor().is_none() {
                debug!(actor_id = %claims.sub, "Token for unknown actor");
                return Err(ApiError::unauthorized("Account no longer exists"));
            }
            session
        }
    };

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Returns the caller if `session` meets `requirement`
pub fn require(session: &Session, requirement: AccessRequirement) -> Result<&Actor, ApiError> {
    let decision = evaluate(session, requirement);
    if !decision.is_allowed() {
        return Err(decision.into());
    }
    session
        .current_actor()
        .ok_or_else(|| ApiError::unauthorized("Sign in required"))
}
