/// Plan catalog endpoints
///
/// # Endpoints
///
/// - `GET /api/plans` - All plans with prices and limits (public)
/// - `PUT /api/plans/:tier` - Override a plan's definition (superadmin)

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
    auth::policy::AccessRequirement,
    models::{
        admin_log::{AdminAction, AdminLog},
        plan::{Plan, PlanCatalog, PlanTier},
    },
    session::Session,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct PlanListResponse {
    pub plans: Vec<Plan>,
}

/// New definition of a tier; omitted limits mean unlimited
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_paise: i64,

    #[serde(default)]
    pub max_invoices: Option<u32>,

    #[serde(default)]
    pub max_contacts: Option<u32>,

    #[serde(default)]
    pub max_users: Option<u32>,
}

pub async fn list_plans(State(state): State<AppState>) -> Json<PlanListResponse> {
    Json(PlanListResponse {
        plans: PlanCatalog::load(&state.store).await.all(),
    })
}

/// Replace a tier's price and limits
///
/// Limits apply to every actor on the tier from the next check onward.
pub async fn update_plan(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(tier): Path<String>,
    Json(req): Json<UpdatePlanRequest>,
) -> ApiResult<Json<Plan>> {
    let actor = require(&session, AccessRequirement::Superadmin)?;
    req.validate()?;

    let tier = PlanTier::from_str(&tier)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown plan '{}'", tier)))?;

    let plan = PlanCatalog::upsert(
        &state.store,
        Plan {
            tier,
            name: req.name,
            price_paise: req.price_paise,
            max_invoices: req.max_invoices,
            max_contacts: req.max_contacts,
            max_users: req.max_users,
        },
    )
    .await?;

    AdminLog::record(
        &state.store,
        AdminLog::new(
            actor.id,
            AdminAction::UpdatePlanDefinition,
            None,
            json!({ "tier": tier.as_str(), "plan": &plan }),
        ),
    )
    .await?;

    info!(tier = %tier, "Plan definition updated");
    Ok(Json(plan))
}
