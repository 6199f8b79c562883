/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: access and refresh tokens
/// - [`reset_token`]: password reset token generation and hashing
/// - [`policy`]: access requirements and redirect decisions
/// - [`visibility`]: organization scoping of owned records
/// - [`workflow`]: approval, suspension, and plan changes
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id, 64 MB memory and 3 iterations by default
/// - **JWT Tokens**: HS256, identity only; role and status are read per request
/// - **Reset Tokens**: random, stored as SHA-256, single use, expiring
/// - **Constant-time Comparison**: token hashes are compared in constant time
///
/// # Example
///
/// ```no_run
/// use bizacc_shared::auth::password::{hash_password, verify_password};
/// use bizacc_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("MyP@ssw0rd!")?;
/// assert!(verify_password("MyP@ssw0rd!", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), TokenType::Access);
/// let token = create_token(&claims, "a-secret-that-is-at-least-32-bytes!")?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod password;
pub mod policy;
pub mod reset_token;
pub mod visibility;
pub mod workflow;
