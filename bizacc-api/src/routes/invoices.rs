/// Invoice and quotation endpoints
///
/// # Endpoints
///
/// - `GET /api/invoices` / `GET /api/quotations` - Visible documents, newest first
/// - `POST /api/invoices` / `POST /api/quotations` - Create a numbered document
///
/// Invoices count against the plan's invoice limit; quotations do not.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::session::require,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use bizacc_shared::{
    auth::{policy::AccessRequirement, visibility::filter_visible},
    models::{
        actor::ActorDirectory,
        invoice::{DocumentKind, NewSalesDocument, SalesDocument},
    },
    quota::{QuotaGuard, QuotaType},
    session::Session,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(flatten)]
    pub document: NewSalesDocument,

    /// Overrides the configured supplier state code
    #[serde(default)]
    pub supplier_state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<SalesDocument>,
    pub total: usize,
}

async fn list(state: &AppState, session: &Session, kind: DocumentKind) -> ApiResult<Json<DocumentListResponse>> {
    require(session, AccessRequirement::Approved)?;

    let directory = ActorDirectory::load(&state.store).await;
    let mut documents = filter_visible(session, SalesDocument::list(&state.store, kind).await, &directory);
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(DocumentListResponse {
        total: documents.len(),
        documents,
    }))
}

async fn create(
    state: &AppState,
    session: &Session,
    kind: DocumentKind,
    req: CreateDocumentRequest,
) -> ApiResult<(StatusCode, Json<SalesDocument>)> {
    let actor = require(session, AccessRequirement::Approved)?;

    if req.document.customer_name.trim().is_empty() {
        return Err(ApiError::invalid("customer_name", "Customer name is required"));
    }
    let guard = match kind {
        DocumentKind::Invoice => state.quotas.guard(actor, QuotaType::Invoices).await,
        DocumentKind::Quotation => QuotaGuard::unlimited(QuotaType::Invoices),
    };

    let supplier_state = req
        .supplier_state
        .unwrap_or_else(|| state.config.auth.supplier_state.clone());
    let document =
        SalesDocument::create_within(&state.store, kind, actor.id, &supplier_state, req.document, &guard).await?;

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<DocumentListResponse>> {
    list(&state, &session, DocumentKind::Invoice).await
}

/// Create an invoice
///
/// # Errors
///
/// - `402 Payment Required`: Invoice limit reached
/// - `422 Unprocessable Entity`: No items, negative line, or invalid GSTIN
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<SalesDocument>)> {
    create(&state, &session, DocumentKind::Invoice, req).await
}

pub async fn list_quotations(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<DocumentListResponse>> {
    list(&state, &session, DocumentKind::Quotation).await
}

pub async fn create_quotation(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<SalesDocument>)> {
    create(&state, &session, DocumentKind::Quotation, req).await
}
