//! Authentication and authorization
//!
//! Tokens carry role names; each route group is gated on a single
//! [`Capability`] that at least one of those roles must grant.

use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (staff member or client id)
    pub sub: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Returns true if any role grants `capability`
    pub fn can(&self, capability: Capability) -> bool {
        self.roles
            .iter()
            .any(|role| capabilities_of(role).contains(&capability))
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Missing capability: {0}")]
    MissingCapability(Capability),
}

/// What a caller may do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Read balances and the credit log
    ViewCredits,
    /// Grant credits
    ManageCredits,
    /// Register clients and entities, edit billing profiles and payers
    ManageClients,
    /// Create, move and close bookings
    ManageBookings,
    /// Cancel a booking under the client cancellation rules
    CancelOwnBooking,
    /// Run billing and record payments
    ManageBilling,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewCredits => "credits:read",
            Capability::ManageCredits => "credits:write",
            Capability::ManageClients => "clients:write",
            Capability::ManageBookings => "bookings:write",
            Capability::CancelOwnBooking => "bookings:cancel-own",
            Capability::ManageBilling => "billing:write",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role names understood by the API
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const PRACTITIONER: &str = "practitioner";
    pub const BOOKKEEPER: &str = "bookkeeper";
    pub const CLIENT: &str = "client";
}

/// Capabilities granted by a role; unknown roles grant nothing
pub fn capabilities_of(role: &str) -> &'static [Capability] {
    use Capability::*;
    match role {
        roles::ADMIN => &[
            ViewCredits,
            ManageCredits,
            ManageClients,
            ManageBookings,
            CancelOwnBooking,
            ManageBilling,
        ],
        roles::PRACTITIONER => &[ViewCredits, ManageClients, ManageBookings, CancelOwnBooking],
        roles::BOOKKEEPER => &[ViewCredits, ManageCredits, ManageBilling],
        roles::CLIENT => &[CancelOwnBooking],
        _ => &[],
    }
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `user_id` - User identifier
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    user_id: &str,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = i64::try_from(expiration_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|validity| now.checked_add_signed(validity))
        .ok_or(AuthError::InvalidToken)?;

    let claims = Claims {
        sub: user_id.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn claims(roles: &[&str]) -> Claims {
        Claims {
            sub: "user-1".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_token_round_trip_keeps_roles() {
        let token = create_token("user-1", vec![roles::BOOKKEEPER.into()], SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.roles, vec!["bookkeeper".to_string()]);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token("user-1", vec![], SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_reported_as_expired() {
        let now = Utc::now().timestamp();
        let stale = Claims {
            exp: now - 3600,
            iat: now - 7200,
            ..claims(&[roles::ADMIN])
        };
        let token = encode(&Header::default(), &stale, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_role_capabilities() {
        assert!(claims(&[roles::ADMIN]).can(Capability::ManageBilling));
        assert!(claims(&[roles::BOOKKEEPER]).can(Capability::ManageCredits));
        assert!(!claims(&[roles::BOOKKEEPER]).can(Capability::ManageBookings));
        assert!(claims(&[roles::CLIENT]).can(Capability::CancelOwnBooking));
        assert!(!claims(&[roles::CLIENT]).can(Capability::ViewCredits));
        assert!(!claims(&["intern"]).can(Capability::CancelOwnBooking));
        assert!(claims(&[roles::CLIENT, roles::PRACTITIONER]).can(Capability::ManageBookings));
    }
}
