//! Bearer token verification for protected services.
//!
//! # Responsibilities
//! - Extract `Authorization: Bearer <token>`
//! - Verify the HS256 signature with the shared secret
//! - Surface the caller's user id for the access log
//!
//! # Design Decisions
//! - Tokens are verified, never issued; issuance belongs to the auth service
//! - `exp` is enforced when present but not required
//! - The Authorization header is still forwarded untouched

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Why a request to a protected service was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing or invalid authorization header")]
    MissingBearer,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Invalid token claims")]
    InvalidClaims,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    sub: Option<String>,
}

impl Claims {
    fn user_id(&self) -> Option<String> {
        match &self.user_id {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(n)) => {
                if let Some(id) = n.as_u64() {
                    Some(id.to_string())
                } else if let Some(id) = n.as_i64() {
                    Some(id.to_string())
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| (f as i64).to_string())
                }
            }
            _ => self.sub.clone().filter(|s| !s.is_empty()),
        }
    }
}

/// Verifies bearer tokens signed with a shared HMAC secret.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify the request's bearer token and return the caller's user id.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingBearer)?;

        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            AuthError::InvalidToken
        })?;

        data.claims.user_id().ok_or(AuthError::InvalidClaims)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn bearer(claims: Value, secret: &str) -> HeaderMap {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn numeric_user_id_accepted() {
        let verifier = TokenVerifier::new(SECRET);
        let user = verifier
            .authenticate(&bearer(json!({ "user_id": 42 }), SECRET))
            .unwrap();
        assert_eq!(user, "42");
    }

    #[test]
    fn float_user_id_truncated_like_integer() {
        let verifier = TokenVerifier::new(SECRET);
        let user = verifier
            .authenticate(&bearer(json!({ "user_id": 7.0 }), SECRET))
            .unwrap();
        assert_eq!(user, "7");
    }

    #[test]
    fn subject_used_when_user_id_absent() {
        let verifier = TokenVerifier::new(SECRET);
        let user = verifier
            .authenticate(&bearer(json!({ "sub": "alice" }), SECRET))
            .unwrap();
        assert_eq!(user, "alice");
    }

    #[test]
    fn wrong_secret_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        let err = verifier
            .authenticate(&bearer(json!({ "user_id": 1 }), "other"))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn expired_token_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        let err = verifier
            .authenticate(&bearer(json!({ "user_id": 1, "exp": 1_000_000 }), SECRET))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[test]
    fn missing_or_malformed_header_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(
            verifier.authenticate(&HeaderMap::new()).unwrap_err(),
            AuthError::MissingBearer
        );

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(
            verifier.authenticate(&basic).unwrap_err(),
            AuthError::MissingBearer
        );
    }

    #[test]
    fn claims_without_identity_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        let err = verifier
            .authenticate(&bearer(json!({ "role": "admin" }), SECRET))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidClaims);
    }
}
