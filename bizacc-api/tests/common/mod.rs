//! Common test utilities for API tests
//!
//! Builds the full router over an in-memory record store with the default
//! seed superadmin provisioned, plus helpers for JSON requests and for
//! creating approved accounts.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bizacc_api::app::{build_router, AppState};
use bizacc_api::config::Config;
use bizacc_shared::auth::password::{hash_password_with, HashCost};
use bizacc_shared::models::actor::{provision_seed_superadmins, DEFAULT_SEED_SUPERADMIN};
use bizacc_shared::store::RecordStore;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SEED_PASSWORD: &str = "SeedPass123!";
pub const PASSWORD: &str = "Str0ng!Pass";

/// Router plus direct access to its store
pub struct TestApp {
    pub app: Router,
    pub store: RecordStore,
    pub seed_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::for_tests()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let store = RecordStore::memory();
        let state = AppState::new(store.clone(), config).with_hash_cost(HashCost::minimal());

        let seed_hash = hash_password_with(SEED_PASSWORD, HashCost::minimal()).unwrap();
        provision_seed_superadmins(&store, &state.seeds, Some(&seed_hash))
            .await
            .unwrap();

        let mut app = Self {
            app: build_router(state),
            store,
            seed_token: String::new(),
        };
        app.seed_token = app.login(DEFAULT_SEED_SUPERADMIN, SEED_PASSWORD).await;
        app
    }

    /// Sends a request and returns the status with the JSON body (`Null` when empty)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post("/api/auth/login", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Signs up an account; returns the user JSON and its access token
    pub async fn signup(&self, email: &str, role: &str, organization: Option<&str>) -> (Value, String) {
        let (status, body) = self
            .post(
                "/api/auth/signup",
                None,
                json!({
                    "email": email,
                    "password": PASSWORD,
                    "role": role,
                    "organization_id": organization,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "signup failed: {}", body);
        (
            body["user"].clone(),
            body["access_token"].as_str().unwrap().to_string(),
        )
    }

    /// Signs up and has the seed superadmin approve the account
    pub async fn approved(&self, email: &str, role: &str, organization: Option<&str>) -> (Value, String) {
        let (user, token) = self.signup(email, role, organization).await;
        let id = user["id"].as_str().unwrap();

        let (status, body) = self
            .request(
                Method::POST,
                &format!("/api/users/{}/approve", id),
                Some(&self.seed_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "approve failed: {}", body);
        (body, token)
    }
}
