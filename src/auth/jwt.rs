//! JWT token validation
//!
//! Tokens are issued by the workspace's session service; the gateway only
//! verifies them. A dev-mode validator accepts unsigned local tokens so the
//! gateway can run without the session service.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::roles::Role;
use crate::types::WardenError;

/// Claims carried in a workspace session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Person id of the authenticated user
    pub sub: String,
    /// Display identifier (email or username), used in audit logs
    pub identifier: String,
    /// Workspace role
    #[serde(default)]
    pub role: Role,
    /// Issued-at (seconds since epoch)
    pub iat: u64,
    /// Expiry (seconds since epoch)
    pub exp: u64,
}

/// Result of token validation
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

/// Validates JWT bearer tokens
pub struct JwtValidator {
    decoding_key: DecodingKey,
    dev_mode: bool,
}

impl JwtValidator {
    /// Create a validator with the shared session secret
    pub fn new(secret: String) -> Result<Self, WardenError> {
        if secret.is_empty() {
            return Err(WardenError::Config("JWT secret must not be empty".into()));
        }
        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            dev_mode: false,
        })
    }

    /// Create a dev-mode validator using the insecure local secret.
    /// Expiry is still enforced; only the secret is fixed.
    pub fn new_dev() -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(b"dev-only-insecure-secret"),
            dev_mode: true,
        }
    }

    pub fn is_dev(&self) -> bool {
        self.dev_mode
    }

    /// Verify a bearer token and extract its claims
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        let validation = Validation::default();

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => TokenValidationResult {
                valid: true,
                claims: Some(data.claims),
                error: None,
            },
            Err(e) => TokenValidationResult {
                valid: false,
                claims: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header.and_then(|h| h.strip_prefix("Bearer "))
}

/// Sign a token - used by tests and local tooling, never by the gateway itself
pub fn sign_token(claims: &Claims, secret: &str) -> Result<String, WardenError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| WardenError::Auth(e.to_string()))
}
