use crate::types::{AppError, Claims, Identity, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// HS256 token verification bound to one shared secret.
///
/// The algorithm is fixed; tokens signed with anything else are rejected.
/// `exp` is optional, but enforced when present.
pub struct TokenVerifier {
    secret: String,
    validation: Validation,
}

impl TokenVerifier {
    /// Creates a verifier for the given signing secret.
    pub fn new(secret: impl Into<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();

        Self {
            secret: secret.into(),
            validation,
        }
    }

    /// Verifies a JWT token and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &self.validation,
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::invalid_token(format!("Invalid token: {}", e)))
    }

    /// Signs a token carrying `identity` under the `data` claim.
    ///
    /// With a `ttl` the token gets an `exp` claim; without one it never expires.
    pub fn issue(&self, identity: Identity, ttl: Option<Duration>) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            data: identity,
            sub: None,
            exp: ttl.map(|ttl| (now + ttl).timestamp() as usize),
            iat: Some(now.timestamp() as usize),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}
