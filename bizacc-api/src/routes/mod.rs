/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: health check
/// - `auth`: signup, login, tokens, password reset
/// - `users`: actor listing and the approval workflow
/// - `records`: generic owned collections
/// - `invoices`: invoices and quotations
/// - `customers`: customer directory
/// - `plans`: plan catalog
/// - `admin`: reconciliation and audit log

pub mod admin;
pub mod auth;
pub mod customers;
pub mod health;
pub mod invoices;
pub mod plans;
pub mod records;
pub mod users;
