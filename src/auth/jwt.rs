use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

use crate::{config::SessionConfig, error::ApiError, state::AppState};

/// Access tokens are the session; reset tokens only authorize a password
/// reset and are deliberately short-lived.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Reset,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id; 0 for the bootstrap administrator, which has no user row.
    pub sub: i64,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub reset_ttl: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let SessionConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            reset_ttl_minutes,
        } = state.config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs((reset_ttl_minutes as u64) * 60),
        }
    }
}

impl SessionKeys {
    fn sign(&self, sub: i64, role: Role, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Reset => self.reset_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub,
            role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(sub, role = ?role, kind = ?kind, "session token signed");
        Ok(token)
    }

    pub fn sign_user(&self, user_id: i64) -> anyhow::Result<String> {
        self.sign(user_id, Role::User, TokenKind::Access)
    }

    pub fn sign_admin(&self) -> anyhow::Result<String> {
        self.sign(0, Role::Admin, TokenKind::Access)
    }

    pub fn sign_reset(&self, user_id: i64) -> anyhow::Result<String> {
        self.sign(user_id, Role::User, TokenKind::Reset)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn verify_reset(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Reset {
            anyhow::bail!("not a reset token");
        }
        Ok(claims)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized("faça login para acessar"))?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(ApiError::Unauthorized("cabeçalho de autorização inválido"))
}

/// The authenticated patient session: a valid access token with the user
/// role.
pub struct AuthUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let token = bearer_token(parts)?;
        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired session token");
                return Err(ApiError::Unauthorized("sessão inválida ou expirada"));
            }
        };
        if claims.kind != TokenKind::Access {
            return Err(ApiError::Unauthorized("sessão inválida ou expirada"));
        }
        if claims.role != Role::User {
            // the bootstrap admin has no user data to act on
            return Err(ApiError::Unauthorized("faça login como usuário"));
        }
        Ok(AuthUser(claims.sub))
    }
}

/// The administrator session; user-role tokens are rejected with 403.
#[derive(Debug)]
pub struct AdminSession;

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let token = bearer_token(parts)?;
        let claims = keys
            .verify(token)
            .map_err(|_| ApiError::Unauthorized("sessão inválida ou expirada"))?;
        if claims.kind != TokenKind::Access {
            return Err(ApiError::Unauthorized("sessão inválida ou expirada"));
        }
        if claims.role != Role::Admin {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> SessionKeys {
        SessionKeys {
            encoding: EncodingKey::from_secret(b"test-secret"),
            decoding: DecodingKey::from_secret(b"test-secret"),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            access_ttl: Duration::from_secs(300),
            reset_ttl: Duration::from_secs(300),
        }
    }

    #[test]
    fn sign_and_verify_user_token() {
        let keys = make_keys();
        let token = keys.sign_user(42).expect("sign user");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn admin_token_carries_admin_role() {
        let keys = make_keys();
        let token = keys.sign_admin().expect("sign admin");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, 0);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn verify_reset_rejects_access_tokens() {
        let keys = make_keys();
        let access = keys.sign_user(7).expect("sign access");
        let err = keys.verify_reset(&access).unwrap_err();
        assert!(err.to_string().contains("not a reset token"));

        let reset = keys.sign_reset(7).expect("sign reset");
        let claims = keys.verify_reset(&reset).expect("verify reset");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.kind, TokenKind::Reset);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys();
        let mut other = make_keys();
        other.issuer = "other-issuer".into();
        other.audience = "other-aud".into();
        let token = good.sign_user(1).expect("sign");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_tampered_tokens() {
        let keys = make_keys();
        let mut token = keys.sign_user(1).expect("sign");
        token.push('x');
        assert!(keys.verify(&token).is_err());
    }
}
