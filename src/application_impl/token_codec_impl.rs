use crate::application_port::{AuthError, TokenCodec};
use crate::domain_model::*;
use crate::domain_port::Clock;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub const MAX_ACCESS_TTL: Duration = Duration::minutes(15);
pub const MAX_REFRESH_TTL: Duration = Duration::days(30);

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub algorithm: Algorithm,
    pub access_ttl: std::time::Duration,
    pub refresh_ttl: std::time::Duration,
    pub signing_key: Vec<u8>,
    pub refresh_signing_key: Vec<u8>,
}

impl JwtConfig {
    pub fn validate(&self) -> Result<(), AuthError> {
        if !matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::InvalidInput(format!(
                "unsupported signing algorithm {:?}, expected an HMAC algorithm",
                self.algorithm
            )));
        }
        if self.signing_key.is_empty() || self.refresh_signing_key.is_empty() {
            return Err(AuthError::InvalidInput("signing keys must not be empty".into()));
        }
        if self.signing_key == self.refresh_signing_key {
            return Err(AuthError::InvalidInput(
                "access and refresh signing keys must differ".into(),
            ));
        }

        let access_ttl = to_chrono(self.access_ttl)?;
        let refresh_ttl = to_chrono(self.refresh_ttl)?;
        if access_ttl <= Duration::zero() || access_ttl > MAX_ACCESS_TTL {
            return Err(AuthError::InvalidInput(format!(
                "access token lifetime must be within (0, {}s]",
                MAX_ACCESS_TTL.num_seconds()
            )));
        }
        if refresh_ttl > MAX_REFRESH_TTL {
            return Err(AuthError::InvalidInput(format!(
                "refresh token lifetime must not exceed {}s",
                MAX_REFRESH_TTL.num_seconds()
            )));
        }
        if refresh_ttl < access_ttl {
            return Err(AuthError::InvalidInput(
                "refresh token lifetime must be at least the access token lifetime".into(),
            ));
        }
        Ok(())
    }
}

fn to_chrono(d: std::time::Duration) -> Result<Duration, AuthError> {
    Duration::from_std(d).map_err(|e| AuthError::InvalidInput(e.to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    jti: String,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaims {
    sub: String,
    sid: String,
    jti: String,
    iat: i64,
    exp: i64,
    iss: String,
    aud: String,
    typ: String,
}

pub struct JwtTokenCodec {
    cfg: JwtConfig,
    access_ttl: Duration,
    refresh_ttl: Duration,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl JwtTokenCodec {
    pub fn new(cfg: JwtConfig, clock: Arc<dyn Clock>) -> Result<Self, AuthError> {
        cfg.validate()?;
        Ok(JwtTokenCodec {
            access_ttl: to_chrono(cfg.access_ttl)?,
            refresh_ttl: to_chrono(cfg.refresh_ttl)?,
            access_encoding: EncodingKey::from_secret(&cfg.signing_key),
            access_decoding: DecodingKey::from_secret(&cfg.signing_key),
            refresh_encoding: EncodingKey::from_secret(&cfg.refresh_signing_key),
            refresh_decoding: DecodingKey::from_secret(&cfg.refresh_signing_key),
            cfg,
            clock,
        })
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn validation(&self) -> Validation {
        let mut v = Validation::new(self.cfg.algorithm);
        // expiry is checked against the injected clock
        v.validate_exp = false;
        v.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        v
    }

    fn sign<T: Serialize>(&self, claims: &T, key: &EncodingKey) -> Result<String, AuthError> {
        encode(&Header::new(self.cfg.algorithm), claims, key)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str, key: &DecodingKey) -> Result<T, AuthError> {
        let data = decode::<T>(token, key, &self.validation()).map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Malformed,
        })?;
        Ok(data.claims)
    }

    fn check_live(&self, typ: &str, expected: &str, exp: i64) -> Result<DateTime<Utc>, AuthError> {
        if typ != expected {
            return Err(AuthError::Malformed);
        }
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(AuthError::Malformed)?;
        if exp <= self.clock.now().timestamp() {
            return Err(AuthError::Expired);
        }
        Ok(expires_at)
    }
}

impl TokenCodec for JwtTokenCodec {
    fn issue_access_token(&self, user: UserId) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let iat = self.clock.now();
        let exp = (iat + self.access_ttl).timestamp();
        let claims = AccessClaims {
            sub: user.to_string(),
            jti: Self::gen_jti(),
            iat: iat.timestamp(),
            exp,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            typ: ACCESS_TOKEN_TYPE.to_string(),
        };
        let token = self.sign(&claims, &self.access_encoding)?;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::InternalError("expiry out of range".into()))?;
        Ok((AccessToken(token), expires_at))
    }

    fn issue_refresh_token(
        &self,
        user: UserId,
        session: &Session,
        token_id: &str,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let iat = self.clock.now();
        let exp = (iat + self.refresh_ttl).min(session.expires_at).timestamp();
        let claims = RefreshClaims {
            sub: user.to_string(),
            sid: session.id.to_string(),
            jti: token_id.to_string(),
            iat: iat.timestamp(),
            exp,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            typ: REFRESH_TOKEN_TYPE.to_string(),
        };
        let token = self.sign(&claims, &self.refresh_encoding)?;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::InternalError("expiry out of range".into()))?;
        Ok((RefreshToken(token), expires_at))
    }

    fn validate_access_token(&self, token: &AccessToken) -> Result<VerifiedAccess, AuthError> {
        let claims: AccessClaims = self.verify(&token.0, &self.access_decoding)?;
        let expires_at = self.check_live(&claims.typ, ACCESS_TOKEN_TYPE, claims.exp)?;
        let user_id = claims.sub.parse::<UserId>().map_err(|_| AuthError::Malformed)?;
        Ok(VerifiedAccess {
            user_id,
            token_id: claims.jti,
            expires_at,
        })
    }

    fn validate_refresh_token(&self, token: &RefreshToken) -> Result<VerifiedRefresh, AuthError> {
        let claims: RefreshClaims = self.verify(&token.0, &self.refresh_decoding)?;
        let expires_at = self.check_live(&claims.typ, REFRESH_TOKEN_TYPE, claims.exp)?;
        let user_id = claims.sub.parse::<UserId>().map_err(|_| AuthError::Malformed)?;
        let session_id = claims.sid.parse::<SessionId>().map_err(|_| AuthError::Malformed)?;
        Ok(VerifiedRefresh {
            user_id,
            session_id,
            token_id: claims.jti,
            expires_at,
        })
    }

    fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}
