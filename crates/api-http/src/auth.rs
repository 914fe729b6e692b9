//! Bearer token authentication
//!
//! Two token providers exist: RS512 signatures over a PEM key pair and
//! HS512 with a shared secret. One is chosen at startup from configuration
//! and every request is checked against it.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::AppState;

/// Clock skew tolerated when checking `exp`
const LEEWAY_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing bearer token")]
    Missing,

    #[error("authorization header must be 'Bearer <token>'")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token key error: {0}")]
    Key(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                TokenError::Key(err.to_string())
            }
            _ => TokenError::Invalid(err.to_string()),
        }
    }
}

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Organization (ACO) id
    pub aco: String,
    /// Token id
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

pub trait TokenProvider: Send + Sync {
    /// Sign a new token for `user_id` acting for `org_id`
    fn issue(&self, user_id: &str, org_id: &str) -> Result<String, TokenError>;

    /// Check signature and expiry
    fn validate(&self, token: &str) -> Result<(), TokenError> {
        self.decode(token).map(|_| ())
    }

    /// Validated claims of `token`
    fn decode(&self, token: &str) -> Result<Claims, TokenError>;
}

/// Signing material shared by both providers
struct Keys {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl Keys {
    fn issue(&self, user_id: &str, org_id: &str) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            aco: org_id.to_string(),
            id: Uuid::new_v4().to_string(),
            iat,
            exp: iat + self.ttl_secs,
        };
        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding)?)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = LEEWAY_SECS;
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// RS512 tokens signed with an RSA private key
pub struct RsaTokenProvider {
    keys: Keys,
}

impl RsaTokenProvider {
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8], ttl_secs: i64) -> Result<Self, TokenError> {
        Ok(Self {
            keys: Keys {
                algorithm: Algorithm::RS512,
                encoding: EncodingKey::from_rsa_pem(private_pem)?,
                decoding: DecodingKey::from_rsa_pem(public_pem)?,
                ttl_secs,
            },
        })
    }
}

impl TokenProvider for RsaTokenProvider {
    fn issue(&self, user_id: &str, org_id: &str) -> Result<String, TokenError> {
        self.keys.issue(user_id, org_id)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.keys.decode(token)
    }
}

/// HS512 tokens over a shared secret
pub struct HmacTokenProvider {
    keys: Keys,
}

impl HmacTokenProvider {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Key("HMAC secret must not be empty".to_string()));
        }
        Ok(Self {
            keys: Keys {
                algorithm: Algorithm::HS512,
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                ttl_secs,
            },
        })
    }
}

impl TokenProvider for HmacTokenProvider {
    fn issue(&self, user_id: &str, org_id: &str) -> Result<String, TokenError> {
        self.keys.issue(user_id, org_id)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.keys.decode(token)
    }
}

/// Key material for the configured provider
pub enum AuthConfig {
    Rsa {
        private_key_pem: Vec<u8>,
        public_key_pem: Vec<u8>,
    },
    Hmac {
        secret: Vec<u8>,
    },
}

/// The provider selected at startup
pub enum AuthProvider {
    Rsa(RsaTokenProvider),
    Hmac(HmacTokenProvider),
}

impl AuthProvider {
    pub fn new(config: AuthConfig, ttl_secs: i64) -> Result<Self, TokenError> {
        match config {
            AuthConfig::Rsa {
                private_key_pem,
                public_key_pem,
            } => Ok(AuthProvider::Rsa(RsaTokenProvider::from_pem(
                &private_key_pem,
                &public_key_pem,
                ttl_secs,
            )?)),
            AuthConfig::Hmac { secret } => {
                Ok(AuthProvider::Hmac(HmacTokenProvider::new(&secret, ttl_secs)?))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthProvider::Rsa(_) => "rsa",
            AuthProvider::Hmac(_) => "hmac",
        }
    }

    fn inner(&self) -> &dyn TokenProvider {
        match self {
            AuthProvider::Rsa(p) => p as &dyn TokenProvider,
            AuthProvider::Hmac(p) => p as &dyn TokenProvider,
        }
    }
}

impl TokenProvider for AuthProvider {
    fn issue(&self, user_id: &str, org_id: &str) -> Result<String, TokenError> {
        self.inner().issue(user_id, org_id)
    }

    fn validate(&self, token: &str) -> Result<(), TokenError> {
        self.inner().validate(token)
    }

    fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.inner().decode(token)
    }
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(value: Option<&str>) -> Result<&str, TokenError> {
    let value = value.ok_or(TokenError::Missing)?;
    let (scheme, token) = value.split_once(' ').ok_or(TokenError::Malformed)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(TokenError::Malformed);
    }
    Ok(token)
}

/// Claims of the request's validated bearer token
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|v| v.to_str().map_err(|_| TokenError::Malformed))
            .transpose()?;
        let token = bearer_token(header)?;
        let claims = state.tokens.decode(token).map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            e
        })?;
        Ok(Authenticated(claims))
    }
}
