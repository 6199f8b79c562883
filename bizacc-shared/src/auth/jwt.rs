/// JWT token generation and validation
///
/// Tokens are HS256-signed and carry only the actor id and token type.
/// Role, status, and plan are read from the actor record on every request,
/// so approvals and suspensions apply to tokens already issued.
///
/// # Token Types
///
/// - **Access**: short-lived (1 hour), sent as `Authorization: Bearer`
/// - **Refresh**: long-lived (30 days), exchanged for new access tokens
///
/// # Example
///
/// ```
/// use bizacc_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// let secret = "a-secret-that-is-at-least-32-bytes!";
/// let actor_id = Uuid::new_v4();
///
/// let token = create_token(&Claims::new(actor_id, TokenType::Access), secret).unwrap();
/// let claims = validate_access_token(&token, secret).unwrap();
/// assert_eq!(claims.sub, actor_id);
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer written into and required from every token
pub const ISSUER: &str = "bizacc";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Expected {expected} token, got {actual}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(1),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Registered claims plus the token type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Actor id
    pub sub: Uuid,

    pub iss: String,

    pub iat: i64,

    pub exp: i64,

    pub nbf: i64,

    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the token type's default lifetime
    pub fn new(actor_id: Uuid, token_type: TokenType) -> Self {
        Self::with_expiration(actor_id, token_type, token_type.default_expiration())
    }

    pub fn with_expiration(actor_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: actor_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates signature, issuer, expiry, and not-before
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }

    Ok(claims)
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Issues an access/refresh pair for an actor
pub fn issue_token_pair(
    actor_id: Uuid,
    secret: &str,
    access_ttl: Duration,
    refresh_ttl: Duration,
) -> Result<(String, String), JwtError> {
    let access = create_token(
        &Claims::with_expiration(actor_id, TokenType::Access, access_ttl),
        secret,
    )?;
    let refresh = create_token(
        &Claims::with_expiration(actor_id, TokenType::Refresh, refresh_ttl),
        secret,
    )?;
    Ok((access, refresh))
}
