//! # BizAcc Shared Library
//!
//! Core of the BizAcc multi-tenant accounting service: the record store,
//! identity and access policy, organization scoping, ownership
//! reconciliation, and the business rules the API server builds on.
//!
//! ## Module Organization
//!
//! - `store`: versioned record collections over memory, PostgreSQL, or Redis
//! - `models`: actors, plans, invoices, customers, audit and reset entries
//! - `session`: per-request identity
//! - `auth`: passwords, tokens, access policy, visibility, approval workflow
//! - `migration`: reassignment of orphaned records
//! - `quota`: plan limit enforcement
//! - `gst`: GST arithmetic, GSTIN validation, document numbering
//! - `customers`: external customer service with local fallback
//! - `db`: PostgreSQL pool and schema migrations

pub mod auth;
pub mod customers;
pub mod db;
pub mod gst;
pub mod migration;
pub mod models;
pub mod quota;
pub mod session;
pub mod store;

/// Current version of the BizAcc shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
