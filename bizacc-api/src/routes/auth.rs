/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/signup` - Register a pending admin or user
/// - `POST /api/auth/login` - Exchange credentials for tokens
/// - `POST /api/auth/refresh` - Exchange a refresh token for an access token
/// - `POST /api/auth/forgot-password` - Issue a password reset token
/// - `POST /api/auth/verify-reset-token` - Check a reset token is usable
/// - `POST /api/auth/reset-password` - Set a new password with a reset token
/// - `POST /api/auth/change-password` - Change the caller's password
/// - `GET /api/auth/me` - The caller and what it may do
///
/// Login succeeds for actors that are not yet approved. The response then
/// carries `redirect: "/pending-approval"` and every approved-only endpoint
/// answers `403` with the same redirect until an administrator approves.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::require,
};
use axum::{extract::State, Extension, Json};
use bizacc_shared::{
    auth::{
        jwt,
        password,
        policy::{evaluate, AccessRequirement},
        reset_token,
    },
    models::{
        actor::{Actor, ActorRole, NewActor, PublicActor},
        password_reset::PasswordReset,
        plan::{Plan, PlanCatalog},
    },
    session::Session,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked for strength separately
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// `admin` (default) starts an organization, `user` joins one
    #[serde(default)]
    pub role: Option<ActorRole>,

    /// Required for users: the organization to join
    #[validate(length(min = 1, max = 100, message = "Organization id must be 1-100 characters"))]
    pub organization_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Tokens plus the signed-in actor
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicActor,

    /// Access token (1h by default)
    pub access_token: String,

    /// Refresh token (30d by default)
    pub refresh_token: String,

    /// Set while the account is not approved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub message: &'static str,

    /// Returned outside production, where no mail is sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResetTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResetTokenResponse {
    pub valid: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// The caller as the policy sees it
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: PublicActor,

    /// Role after applying the seed superadmin list
    pub effective_role: ActorRole,

    pub has_approved_access: bool,

    pub organization: Option<String>,

    pub plan: Plan,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

fn check_strength(field: &str, password: &str) -> ApiResult<()> {
    password::validate_password_strength(password).map_err(|e| ApiError::invalid(field, e))
}

fn token_pair(state: &AppState, actor: &Actor) -> ApiResult<(String, String)> {
    Ok(jwt::issue_token_pair(
        actor.id,
        state.jwt_secret(),
        Duration::seconds(state.config.jwt.access_ttl_seconds),
        Duration::seconds(state.config.jwt.refresh_ttl_seconds),
    )?)
}

fn auth_response(state: &AppState, actor: Actor) -> ApiResult<Json<AuthResponse>> {
    let (access_token, refresh_token) = token_pair(state, &actor)?;
    let session = Session::for_actor(actor, state.seeds.clone());
    let redirect = evaluate(&session, AccessRequirement::Approved).redirect();

    let actor = session
        .current_actor()
        .ok_or_else(|| ApiError::InternalError("session lost its actor".to_string()))?;

    Ok(Json(AuthResponse {
        user: PublicActor::from(actor),
        access_token,
        refresh_token,
        redirect,
    }))
}

/// Verifies a password against a stored hash; accounts without a password
/// (seeds created with none) cannot log in this way
fn password_matches(password: &str, hash: &str) -> ApiResult<bool> {
    if hash.is_empty() {
        return Ok(false);
    }
    Ok(password::verify_password(password, hash)?)
}

/// Register a new actor
///
/// Admins get a new organization unless they name one. Users must name an
/// existing organization that still has room on its admin's plan. Every
/// new account starts `pending`.
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `402 Payment Required`: Organization is at its user limit
/// - `422 Unprocessable Entity`: Validation failed
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;
    check_strength("password", &req.password)?;

    let role = req.role.unwrap_or(ActorRole::Admin);
    match role {
        ActorRole::Superadmin => {
            return Err(ApiError::invalid("role", "Superadmin accounts cannot sign up"));
        }
        ActorRole::User => {
            let organization = req
                .organization_id
                .as_deref()
                .ok_or_else(|| ApiError::invalid("organization_id", "Users must join an organization"))?;
            state.quotas.enforce_organization_users(organization).await?;
        }
        ActorRole::Admin => {}
    }

    let password_hash = password::hash_password_with(&req.password, state.hash_cost)?;
    let actor = Actor::create(
        &state.store,
        NewActor {
            email: req.email,
            password_hash,
            name: req.name,
            role,
            organization_id: req.organization_id,
        },
    )
    .await?;

    auth_response(&state, actor)
}

/// Authenticate and return tokens
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let actor = Actor::find_by_email(&state.store, &req.email)
        .await
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    if !password_matches(&req.password, &actor.password_hash)? {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    info!(actor_id = %actor.id, "Actor signed in");
    auth_response(&state, actor)
}

/// Exchange a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let actor = Actor::find_by_id(&state.store, claims.sub)
        .await
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    let (access_token, _) = token_pair(&state, &actor)?;
    Ok(Json(RefreshResponse { access_token }))
}

/// Issue a password reset token
///
/// Always answers `200` so the endpoint does not reveal which emails are
/// registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<ForgotPasswordResponse>> {
    req.validate()?;

    let mut issued = None;
    if let Some(actor) = Actor::find_by_email(&state.store, &req.email).await {
        let (token, token_hash) = reset_token::generate_reset_token();
        PasswordReset::issue(
            &state.store,
            actor.id,
            token_hash,
            Duration::minutes(state.config.auth.reset_token_ttl_minutes),
        )
        .await?;
        info!(actor_id = %actor.id, "Password reset issued");
        issued = Some(token);
    }

    Ok(Json(ForgotPasswordResponse {
        message: "If the email is registered, a reset link has been sent",
        reset_token: if state.config.api.production { None } else { issued },
    }))
}

/// Check a reset token without using it
pub async fn verify_reset_token(
    State(state): State<AppState>,
    Json(req): Json<VerifyResetTokenRequest>,
) -> ApiResult<Json<VerifyResetTokenResponse>> {
    if !reset_token::validate_token_format(&req.token) {
        return Err(ApiError::BadRequest("Reset token is invalid".to_string()));
    }

    let reset = PasswordReset::verify(&state.store, &reset_token::hash_token(&req.token)).await?;
    Ok(Json(VerifyResetTokenResponse {
        valid: true,
        expires_at: reset.expires_at,
    }))
}

/// Set a new password using a reset token; the token is single use
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;
    check_strength("new_password", &req.new_password)?;
    if !reset_token::validate_token_format(&req.token) {
        return Err(ApiError::BadRequest("Reset token is invalid".to_string()));
    }

    let password_hash = password::hash_password_with(&req.new_password, state.hash_cost)?;
    let reset = PasswordReset::consume(&state.store, &reset_token::hash_token(&req.token)).await?;

    Actor::update(&state.store, reset.actor_id, |actor| {
        actor.password_hash = password_hash.clone();
        Ok(())
    })
    .await?;

    info!(actor_id = %reset.actor_id, "Password reset completed");
    Ok(Json(MessageResponse {
        message: "Password has been reset",
    }))
}

/// Change the caller's password; pending actors may do this too
pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let actor = require(&session, AccessRequirement::Authenticated)?;
    req.validate()?;

    if !password_matches(&req.current_password, &actor.password_hash)? {
        return Err(ApiError::invalid("current_password", "Current password is incorrect"));
    }
    check_strength("new_password", &req.new_password)?;

    let password_hash = password::hash_password_with(&req.new_password, state.hash_cost)?;
    Actor::update(&state.store, actor.id, |a| {
        a.password_hash = password_hash.clone();
        Ok(())
    })
    .await?;

    Ok(Json(MessageResponse {
        message: "Password changed",
    }))
}

/// The caller, its effective role, and its plan
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<MeResponse>> {
    let actor = require(&session, AccessRequirement::Authenticated)?;

    let governing = state.quotas.limits_for(actor).await;
    let mut plan = PlanCatalog::load(&state.store).await.get(actor.plan);
    plan.max_invoices = governing.invoices;
    plan.max_contacts = governing.contacts;
    plan.max_users = governing.users;

    Ok(Json(MeResponse {
        user: PublicActor::from(actor),
        effective_role: session.effective_role().unwrap_or(actor.role),
        has_approved_access: session.has_approved_access(),
        organization: actor.organization().map(str::to_string),
        plan,
        redirect: evaluate(&session, AccessRequirement::Approved).redirect(),
    }))
}
