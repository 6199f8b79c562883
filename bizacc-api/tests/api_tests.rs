/// End-to-end tests of the HTTP API
///
/// Every test runs the full router (session layer, security headers,
/// handlers) over an in-memory record store.

mod common;

use axum::http::{Method, StatusCode};
use bizacc_shared::store::EntityType;
use common::{TestApp, PASSWORD, SEED_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn test_health_reports_store() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_anonymous_caller_is_sent_to_login() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/records/products", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["redirect"], "/login");
}

#[tokio::test]
async fn test_pending_signup_is_sent_to_pending_approval() {
    let app = TestApp::new().await;
    let (user, token) = app.signup("owner@acme.in", "admin", None).await;
    assert_eq!(user["status"], "pending");

    let (status, body) = app.get("/api/records/products", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["redirect"], "/pending-approval");

    // Profile stays reachable while pending
    let (status, me) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["has_approved_access"], false);
    assert_eq!(me["redirect"], "/pending-approval");
}

#[tokio::test]
async fn test_seed_superadmin_logs_in_approved() {
    let app = TestApp::new().await;

    let (status, me) = app.get("/api/auth/me", &app.seed_token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["effective_role"], "superadmin");
    assert_eq!(me["has_approved_access"], true);
    assert!(me.get("redirect").is_none());
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = TestApp::new().await;
    app.signup("owner@acme.in", "admin", None).await;

    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "owner@acme.in", "password": "Wr0ng!Pass" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let app = TestApp::new().await;
    app.signup("owner@acme.in", "admin", None).await;

    let (status, _) = app
        .post(
            "/api/auth/signup",
            None,
            json!({ "email": "Owner@Acme.in", "password": PASSWORD }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_superadmin_signup_is_refused() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/auth/signup",
            None,
            json!({ "email": "boss@acme.in", "password": PASSWORD, "role": "superadmin" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "role");
}

#[tokio::test]
async fn test_approval_unlocks_records() {
    let app = TestApp::new().await;
    let (user, token) = app.approved("owner@acme.in", "admin", None).await;
    assert_eq!(user["status"], "approved");

    let (status, created) = app
        .post("/api/records/products", Some(&token), json!({ "name": "Widget", "price": 100 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user_id"], user["id"]);

    let (status, listed) = app.get("/api/records/products", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["records"][0]["name"], "Widget");
}

#[tokio::test]
async fn test_organizations_are_isolated() {
    let app = TestApp::new().await;
    let (_, alice) = app.approved("alice@acme.in", "admin", None).await;
    let (_, bob) = app.approved("bob@globex.in", "admin", None).await;

    let (_, created) = app
        .post("/api/records/contacts", Some(&alice), json!({ "name": "Ravi" }))
        .await;
    let id = created["id"].as_str().unwrap();

    let (_, listed) = app.get("/api/records/contacts", &bob).await;
    assert_eq!(listed["total"], 0);

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/records/contacts/{}", id),
            Some(&bob),
            Some(json!({ "name": "Hijacked" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The superadmin sees every organization
    let (_, listed) = app.get("/api/records/contacts", &app.seed_token).await;
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn test_organization_membership_and_limits() {
    let app = TestApp::new().await;
    let (admin, admin_token) = app.approved("owner@acme.in", "admin", None).await;
    let org = admin["organization_id"].as_str().unwrap().to_string();

    // Free plan allows a single user: the admin
    let (status, _) = app
        .post(
            "/api/auth/signup",
            None,
            json!({ "email": "clerk@acme.in", "password": PASSWORD, "role": "user", "organization_id": org }),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/users/{}/plan", admin["id"].as_str().unwrap()),
            Some(&app.seed_token),
            Some(json!({ "plan": "starter" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (clerk, clerk_token) = app.signup("clerk@acme.in", "user", Some(&org)).await;

    // The organization's admin approves its own users
    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/users/{}/approve", clerk["id"].as_str().unwrap()),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = app.get("/api/users", &admin_token).await;
    assert_eq!(listed["total"], 2);

    let (_, created) = app
        .post("/api/records/products", Some(&admin_token), json!({ "name": "Widget" }))
        .await;
    let id = created["id"].as_str().unwrap();

    // Members see the organization's records but cannot change the admin's
    let (_, listed) = app.get("/api/records/products", &clerk_token).await;
    assert_eq!(listed["total"], 1);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/records/products/{}", id), Some(&clerk_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/records/products/{}", id), Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_members_share_the_organization_contact_limit() {
    let app = TestApp::new().await;
    let limits = json!({ "name": "Free", "price_paise": 0, "max_invoices": 50, "max_contacts": 2, "max_users": 2 });
    let (status, _) = app
        .request(Method::PUT, "/api/plans/free", Some(&app.seed_token), Some(limits))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (admin, admin_token) = app.approved("owner@acme.in", "admin", None).await;
    let org = admin["organization_id"].as_str().unwrap().to_string();
    let (_, clerk_token) = app.approved("clerk@acme.in", "user", Some(&org)).await;

    for name in ["Ravi", "Meera"] {
        let (status, _) = app
            .post("/api/records/contacts", Some(&admin_token), json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _) = app
        .post("/api/records/contacts", Some(&clerk_token), json!({ "name": "Arjun" }))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    // Other collections are not limited
    let (status, _) = app
        .post("/api/records/products", Some(&clerk_token), json!({ "name": "Widget" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let contacts: Vec<serde_json::Value> = app.store.load(EntityType::Contacts).await;
    assert_eq!(contacts.len(), 2);
}

#[tokio::test]
async fn test_records_stored_without_ids_can_be_edited() {
    let app = TestApp::new().await;
    let (admin, token) = app.approved("owner@acme.in", "admin", None).await;

    app.store
        .save(
            EntityType::Products,
            &[
                json!({ "name": "Old stock", "user_id": admin["id"] }),
                json!({ "id": "", "name": "Older stock", "user_id": admin["id"] }),
            ],
        )
        .await
        .unwrap();

    let (_, first) = app.get("/api/records/products", &token).await;
    let (_, second) = app.get("/api/records/products", &token).await;
    assert_eq!(first["records"], second["records"]);

    let id = first["records"][0]["id"].as_str().unwrap().to_string();
    let (status, updated) = app
        .request(
            Method::PUT,
            &format!("/api/records/products/{}", id),
            Some(&token),
            Some(json!({ "name": "Clearance" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], id.as_str());

    let other = first["records"][1]["id"].as_str().unwrap().to_string();
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/records/products/{}", other), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = app.get("/api/records/products", &token).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["records"][0]["name"], "Clearance");
}

#[tokio::test]
async fn test_user_must_join_existing_organization() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/auth/signup",
            None,
            json!({ "email": "clerk@acme.in", "password": PASSWORD, "role": "user", "organization_id": "nowhere" }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "organization_id");
}

#[tokio::test]
async fn test_seed_superadmin_cannot_be_suspended() {
    let app = TestApp::new().await;
    let (_, me) = app.get("/api/auth/me", &app.seed_token).await;
    let seed_id = me["user"]["id"].as_str().unwrap().to_string();

    let (_, admin_token) = app.approved("owner@acme.in", "admin", None).await;
    let (status, _) = app
        .request(Method::POST, &format!("/api/users/{}/suspend", seed_id), Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::POST, &format!("/api/users/{}/suspend", seed_id), Some(&app.seed_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_suspension_takes_effect_without_new_token() {
    let app = TestApp::new().await;
    let (user, token) = app.approved("owner@acme.in", "admin", None).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/users/{}/suspend", user["id"].as_str().unwrap()),
            Some(&app.seed_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/records/products", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["redirect"], "/pending-approval");
}

#[tokio::test]
async fn test_password_reset_is_single_use() {
    let app = TestApp::new().await;
    app.signup("owner@acme.in", "admin", None).await;

    let (status, body) = app
        .post("/api/auth/forgot-password", None, json!({ "email": "owner@acme.in" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["reset_token"].as_str().unwrap().to_string();

    let (status, _) = app
        .post("/api/auth/verify-reset-token", None, json!({ "token": token }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let reset = json!({ "token": token, "new_password": "N3w!Password" });
    let (status, _) = app.post("/api/auth/reset-password", None, reset.clone()).await;
    assert_eq!(status, StatusCode::OK);

    app.login("owner@acme.in", "N3w!Password").await;

    let (status, _) = app.post("/api/auth/reset-password", None, reset).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_unknown_email() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post("/api/auth/forgot-password", None, json!({ "email": "ghost@acme.in" }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("reset_token").is_none());
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new().await;
    let (_, token) = app.signup("owner@acme.in", "admin", None).await;

    let (status, _) = app
        .post(
            "/api/auth/change-password",
            Some(&token),
            json!({ "current_password": PASSWORD, "new_password": "An0ther!Pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.login("owner@acme.in", "An0ther!Pass").await;
}

#[tokio::test]
async fn test_refresh_issues_access_token() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "admin@bizacc.in", "password": SEED_PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, refreshed) = app
        .post(
            "/api/auth/refresh",
            None,
            json!({ "refresh_token": body["refresh_token"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let access = refreshed["access_token"].as_str().unwrap();
    let (status, _) = app.get("/api/auth/me", access).await;
    assert_eq!(status, StatusCode::OK);

    // An access token is not a refresh token
    let (status, _) = app
        .post(
            "/api/auth/refresh",
            None,
            json!({ "refresh_token": body["access_token"] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invoice_numbering_and_tax() {
    let app = TestApp::new().await;
    let (_, token) = app.approved("owner@acme.in", "admin", None).await;

    let invoice = json!({
        "customer_name": "Sharma Traders",
        "place_of_supply": "27",
        "items": [{
            "description": "Consulting",
            "quantity": 2,
            "unit_price_paise": 50000,
            "gst_rate": 18
        }]
    });

    let (status, first) = app.post("/api/invoices", Some(&token), invoice.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    assert_eq!(first["number"], "INV-0001");
    assert_eq!(first["supply_type"], "intra_state");

    let (_, second) = app.post("/api/invoices", Some(&token), invoice).await;
    assert_eq!(second["number"], "INV-0002");

    let (_, listed) = app.get("/api/invoices", &token).await;
    assert_eq!(listed["total"], 2);
}

#[tokio::test]
async fn test_invoice_without_items_is_invalid() {
    let app = TestApp::new().await;
    let (_, token) = app.approved("owner@acme.in", "admin", None).await;

    let (status, _) = app
        .post("/api/invoices", Some(&token), json!({ "customer_name": "X", "items": [] }))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invoices_are_not_written_through_records() {
    let app = TestApp::new().await;
    let (_, token) = app.approved("owner@acme.in", "admin", None).await;

    let (status, _) = app
        .post("/api/records/invoices", Some(&token), json!({ "total": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/records/allUsers", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_customers_fall_back_to_local_store() {
    let app = TestApp::new().await;
    let (_, token) = app.approved("owner@acme.in", "admin", None).await;

    let (status, created) = app
        .post("/api/customers", Some(&token), json!({ "name": "Sharma Traders", "city": "Pune" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["fallback"], false);

    let id = created["customer"]["id"].as_str().unwrap();
    let (status, updated) = app
        .request(
            Method::PUT,
            &format!("/api/customers/{}", id),
            Some(&token),
            Some(json!({ "name": "Sharma & Sons" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["customer"]["name"], "Sharma & Sons");

    let (_, listed) = app.get("/api/customers", &token).await;
    assert_eq!(listed["total"], 1);
    assert!(listed.get("notice").is_none());
}

#[tokio::test]
async fn test_plans_are_public_and_editable_by_superadmin() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/plans", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plans"].as_array().unwrap().len(), 5);

    let update = json!({ "name": "Free", "price_paise": 0, "max_invoices": 10, "max_contacts": 10, "max_users": 2 });

    let (_, admin_token) = app.approved("owner@acme.in", "admin", None).await;
    let (status, _) = app
        .request(Method::PUT, "/api/plans/free", Some(&admin_token), Some(update.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, plan) = app
        .request(Method::PUT, "/api/plans/free", Some(&app.seed_token), Some(update))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["max_invoices"], 10);

    let (_, logs) = app.get("/api/admin/logs", &app.seed_token).await;
    assert!(logs["logs"]
        .as_array()
        .unwrap()
        .iter()
        .any(|l| l["action"] == "update_plan_definition"));
}

#[tokio::test]
async fn test_reconcile_adopts_legacy_records_once() {
    let app = TestApp::new().await;
    let (user, token) = app.approved("owner@acme.in", "admin", None).await;

    app.store
        .save(
            EntityType::Products,
            &[json!({ "id": 7, "name": "Old stock", "user_id": "42" })],
        )
        .await
        .unwrap();

    let (_, listed) = app.get("/api/records/products", &token).await;
    assert_eq!(listed["total"], 0);

    let (status, report) = app
        .post("/api/admin/reconcile", Some(&token), json!({ "entities": ["products"] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["entities"][0]["rewritten"], 1);

    let (_, listed) = app.get("/api/records/products", &token).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["records"][0]["user_id"], user["id"]);

    let (_, report) = app
        .request(Method::POST, "/api/admin/reconcile", Some(&token), None)
        .await;
    let rewritten: u64 = report["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["rewritten"].as_u64().unwrap())
        .sum();
    assert_eq!(rewritten, 0);
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let app = TestApp::new().await;

    let response = {
        use tower::ServiceExt;
        app.app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    };

    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
}
