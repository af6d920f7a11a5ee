use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: usize,
}

/// The signed-in user a request or session acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Identity { user_id: user_id.into() }
    }
}

/// HS256 keys used to issue and check identity tokens.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            ttl: chrono::Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String> {
        let expiration = chrono::Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal("token expiry overflow".into()))?
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to encode token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Identity> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| Identity::new(data.claims.sub))
            .map_err(|e| AppError::Unauthenticated(format!("Invalid token: {}", e)))
    }
}

// Populated by `AuthMiddleware`; absent for anonymous requests.
impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let identity = req.extensions().get::<Identity>().cloned();
        ready(identity.ok_or_else(|| AppError::Unauthenticated("Login required".into())))
    }
}

/// Client-side view of the current session.
#[async_trait]
pub trait SessionGuard: Send + Sync {
    fn current_user(&self) -> Option<Identity>;

    /// Returns a newly issued token for the current user.
    async fn fresh_id_token(&self) -> Result<String>;
}

pub struct TokenSession {
    identity: Option<Identity>,
    keys: TokenKeys,
}

impl TokenSession {
    pub fn signed_in(identity: Identity, keys: TokenKeys) -> Self {
        TokenSession {
            identity: Some(identity),
            keys,
        }
    }

    pub fn anonymous(keys: TokenKeys) -> Self {
        TokenSession { identity: None, keys }
    }
}

#[async_trait]
impl SessionGuard for TokenSession {
    fn current_user(&self) -> Option<Identity> {
        self.identity.clone()
    }

    async fn fresh_id_token(&self) -> Result<String> {
        let identity = self
            .identity
            .as_ref()
            .ok_or_else(|| AppError::Unauthenticated("No user is signed in".into()))?;
        self.keys.issue(&identity.user_id)
    }
}
