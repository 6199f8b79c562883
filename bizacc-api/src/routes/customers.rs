/// Customer directory endpoints
///
/// # Endpoints
///
/// - `GET /api/customers` - Visible customers, newest first
/// - `POST /api/customers` - Create a customer
/// - `PUT /api/customers/:id` - Edit a customer
///
/// Responses carry `fallback: true` (and a `notice` on listings) when the
/// external customer service was unavailable and the local copy was used.

use crate::{app::AppState, error::ApiResult, middleware::session::require};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use bizacc_shared::{
    auth::policy::AccessRequirement,
    customers::{CustomerListing, SavedCustomer},
    models::{
        actor::ActorDirectory,
        customer::{Customer, CustomerInput},
    },
    session::Session,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CustomerListResponse {
    pub customers: Vec<Customer>,
    pub total: usize,
    pub fallback: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

impl From<CustomerListing> for CustomerListResponse {
    fn from(listing: CustomerListing) -> Self {
        Self {
            total: listing.customers.len(),
            customers: listing.customers,
            fallback: listing.fallback,
            notice: listing.notice,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub customer: Customer,
    pub fallback: bool,
}

impl From<SavedCustomer> for CustomerResponse {
    fn from(saved: SavedCustomer) -> Self {
        Self {
            customer: saved.customer,
            fallback: saved.fallback,
        }
    }
}

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<CustomerListResponse>> {
    require(&session, AccessRequirement::Approved)?;

    let directory = ActorDirectory::load(&state.store).await;
    let listing = state.customers.list(&session, &directory).await;
    Ok(Json(listing.into()))
}

/// Create a customer owned by the caller
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Empty name
/// - `400 Bad Request`: The customer service rejected the row
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<(StatusCode, Json<CustomerResponse>)> {
    require(&session, AccessRequirement::Approved)?;

    let saved = state.customers.create(&session, input).await?;
    Ok((StatusCode::CREATED, Json(saved.into())))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(input): Json<CustomerInput>,
) -> ApiResult<Json<CustomerResponse>> {
    require(&session, AccessRequirement::Approved)?;

    let directory = ActorDirectory::load(&state.store).await;
    let saved = state.customers.update(&session, &directory, &id, input).await?;
    Ok(Json(saved.into()))
}
