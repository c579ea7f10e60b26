use super::error::ApiErrorCode;
use crate::application_port::AuthService;
use crate::domain_model::{UserId, VerifiedAccess};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use warp::http::header::AUTHORIZATION;
use warp::http::{HeaderMap, HeaderValue};
use warp::{Filter, reject};

/// Identity attached to a request that carried a valid access token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

impl From<VerifiedAccess> for AuthContext {
    fn from(verified: VerifiedAccess) -> Self {
        AuthContext {
            user_id: verified.user_id,
            token_id: verified.token_id,
            expires_at: verified.expires_at,
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` value. The
/// scheme is case-insensitive.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Stateless: validates the access token only, no session lookup.
pub fn with_authentication(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (AuthContext,), Error = warp::Rejection> + Clone {
    warp::header::headers_cloned()
        .map(|headers: HeaderMap| headers.get(AUTHORIZATION).cloned())
        .and_then(move |header: Option<HeaderValue>| {
            let auth_service = auth_service.clone();
            async move {
                // a non-ASCII header value is no credential either
                let Some(token) = header
                    .as_ref()
                    .and_then(|value| value.to_str().ok())
                    .and_then(bearer_token)
                else {
                    debug!("request without bearer token");
                    return Err(reject::custom(ApiErrorCode::Unauthenticated));
                };
                let verified = auth_service
                    .verify_access_token(token)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok(AuthContext::from(verified))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic dXNlcjpwdw=="), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
