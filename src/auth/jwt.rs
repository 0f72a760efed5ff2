//! JWT token codec
//!
//! Signs and verifies the two token classes. Access and refresh tokens use
//! independent secrets, audiences and lifetimes; max-age is enforced from `iat`
//! against the injected clock rather than trusted from the payload's `exp`.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::auth::clock::Clock;
use crate::auth::types::{
    ACCESS_AUDIENCE, AccessClaims, REFRESH_AUDIENCE, RefreshClaims, TOKEN_ISSUER,
};
use crate::config::AuthConfig;
use crate::error::{RbacError, Result, TokenError};

/// One signing class: keys, validation rules and lifetime.
struct TokenClass {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl TokenClass {
    fn new(secret: &str, audience: &str, ttl_seconds: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_audience(&[audience]);
        // Expiry is checked by the codec against its clock
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
        }
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> std::result::Result<T, TokenError> {
        decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed,
            })
    }

    const fn is_expired(&self, now: i64, iat: i64, exp: i64) -> bool {
        now > iat + self.ttl_seconds || now > exp
    }
}

/// JWT token codec
pub struct TokenCodec {
    access: TokenClass,
    refresh: TokenClass,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Create a codec; both secrets must be non-empty and distinct.
    pub fn new(config: &AuthConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err(RbacError::config("JWT secrets must not be empty"));
        }
        if config.access_secret == config.refresh_secret {
            return Err(RbacError::config(
                "access and refresh tokens must use different secrets",
            ));
        }
        if config.access_expires_in <= 0 || config.refresh_expires_in <= 0 {
            return Err(RbacError::config("token lifetimes must be positive"));
        }

        Ok(Self {
            access: TokenClass::new(
                &config.access_secret,
                ACCESS_AUDIENCE,
                config.access_expires_in,
            ),
            refresh: TokenClass::new(
                &config.refresh_secret,
                REFRESH_AUDIENCE,
                config.refresh_expires_in,
            ),
            clock,
        })
    }

    /// Access token lifetime in seconds
    #[must_use]
    pub const fn access_ttl(&self) -> i64 {
        self.access.ttl_seconds
    }

    /// Refresh token lifetime in seconds
    #[must_use]
    pub const fn refresh_ttl(&self) -> i64 {
        self.refresh.ttl_seconds
    }

    /// Sign an access token carrying the user's identity.
    pub fn sign_access(&self, user: &entity::users::Model) -> Result<String> {
        let iat = self.clock.now().timestamp();
        let claims = AccessClaims {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            iat,
            exp: iat + self.access.ttl_seconds,
            iss: TOKEN_ISSUER.to_string(),
            aud: ACCESS_AUDIENCE.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.access.encoding_key,
        )?)
    }

    /// Verify an access token's signature, audience and max-age.
    pub fn verify_access(&self, token: &str) -> std::result::Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.access.decode(token)?;
        let now = self.clock.now().timestamp();
        if self.access.is_expired(now, claims.iat, claims.exp) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Sign a refresh token; only the user id is embedded.
    pub fn sign_refresh(&self, user_id: i32) -> Result<String> {
        let iat = self.clock.now().timestamp();
        let claims = RefreshClaims {
            id: user_id,
            iat,
            exp: iat + self.refresh.ttl_seconds,
            iss: TOKEN_ISSUER.to_string(),
            aud: REFRESH_AUDIENCE.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.refresh.encoding_key,
        )?)
    }

    /// Verify a refresh token. Every failure is `InvalidRefreshToken`.
    pub fn verify_refresh(&self, token: &str) -> std::result::Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self
            .refresh
            .decode(token)
            .map_err(|_| TokenError::InvalidRefreshToken)?;
        let now = self.clock.now().timestamp();
        if self.refresh.is_expired(now, claims.iat, claims.exp) {
            return Err(TokenError::InvalidRefreshToken);
        }
        Ok(claims)
    }
}
