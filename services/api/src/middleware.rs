//! Authentication middleware for JWT token validation
//!
//! Tokens are issued by the organization's identity provider and signed with
//! RS256. This service only verifies them and checks the `roles` claim.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::ApiError, state::AppState};

pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_ADMIN: &str = "admin";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID at the identity provider
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Expiration time
    pub exp: u64,
}

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Managers run the check-in station; admins can do everything
    pub fn is_staff(&self) -> bool {
        self.has_role(ROLE_MANAGER) || self.has_role(ROLE_ADMIN)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

/// Verifies bearer tokens against the configured public key
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Build from a PEM string or a path to a PEM file
    pub fn from_public_key(public_key: &str) -> anyhow::Result<Self> {
        let public_key = if public_key.trim_start().starts_with("-----BEGIN") {
            public_key.to_string()
        } else {
            std::fs::read_to_string(public_key)
                .map_err(|e| anyhow::anyhow!("Failed to read public key file {}: {}", public_key, e))?
        };

        let decoding_key = DecodingKey::from_rsa_pem(public_key.trim().as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, ApiError> {
        let token_data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("Failed to validate token: {}", e);
                ApiError::Unauthorized
            })?;

        Ok(AuthUser {
            id: token_data.claims.sub,
            roles: token_data.claims.roles,
        })
    }
}

fn authenticate(state: &AppState, req: &Request) -> Result<AuthUser, ApiError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    state.jwt.verify(token)
}

/// Manager or admin
pub async fn require_staff(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, &req)?;
    if !user.is_staff() {
        warn!("Rejected non-staff user: {}", user.id);
        return Err(ApiError::Forbidden);
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Admin only
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, &req)?;
    if !user.is_admin() {
        warn!("Rejected non-admin user: {}", user.id);
        return Err(ApiError::Forbidden);
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
pub(crate) mod test_keys {
    use jsonwebtoken::{EncodingKey, Header};

    use super::*;

    pub const PUBLIC_KEY: &str = include_str!("../tests/fixtures/test_public.pem");
    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/test_private.pem");

    pub fn token(roles: &[&str], exp: u64) -> String {
        let claims = Claims {
            sub: "user-1".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            exp,
        };
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
    }

    pub fn valid_token(roles: &[&str]) -> String {
        token(roles, chrono::Utc::now().timestamp() as u64 + 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::test_keys::*;
    use super::*;

    #[test]
    fn test_verify_valid_token() {
        let verifier = JwtVerifier::from_public_key(PUBLIC_KEY).unwrap();
        let user = verifier.verify(&valid_token(&[ROLE_MANAGER])).unwrap();
        assert_eq!(user.id, "user-1");
        assert!(user.is_staff());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let verifier = JwtVerifier::from_public_key(PUBLIC_KEY).unwrap();
        let expired = token(&[ROLE_ADMIN], 1_000_000);
        assert!(matches!(verifier.verify(&expired), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let verifier = JwtVerifier::from_public_key(PUBLIC_KEY).unwrap();
        assert!(matches!(verifier.verify("not.a.jwt"), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn test_missing_key_file() {
        assert!(JwtVerifier::from_public_key("/nonexistent/key.pem").is_err());
    }

    #[test]
    fn test_roles() {
        let attendee = AuthUser {
            id: "u".to_string(),
            roles: vec!["attendee".to_string()],
        };
        assert!(!attendee.is_staff());

        let admin = AuthUser {
            id: "u".to_string(),
            roles: vec![ROLE_ADMIN.to_string()],
        };
        assert!(admin.is_staff());
        assert!(admin.is_admin());
    }
}
