/// Middleware modules for the API server
///
/// - `security`: security response headers
/// - `session`: bearer token to [`bizacc_shared::session::Session`]

pub mod security;
pub mod session;
