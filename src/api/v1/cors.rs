use std::convert::Infallible;
use std::sync::Arc;
use warp::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY,
};
use warp::http::{HeaderMap, HeaderValue, Method, StatusCode};
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

const ALLOW_HEADERS: &str = "Origin, Content-Type, Accept, Authorization";
const ALLOW_METHODS: &str = "GET, POST, PATCH, DELETE, OPTIONS";

/// Credentialed CORS. The request `Origin` is echoed back, never `*`, so
/// browsers accept cookies and `Authorization` across origins.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    // empty echoes any origin
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == origin)
    }

    pub fn decorate(&self, origin: Option<&HeaderValue>, mut response: Response) -> Response {
        let headers = response.headers_mut();
        headers.append(VARY, HeaderValue::from_static("Origin"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );

        let echoed = origin.filter(|value| value.to_str().is_ok_and(|o| self.allows(o)));
        if let Some(origin) = echoed {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        }
        response
    }
}

/// Answers every `OPTIONS` request with 200 before any route or
/// authentication runs.
pub fn preflight() -> impl Filter<Extract = (StatusCode,), Error = Rejection> + Clone {
    // not_found for other methods, so routing errors stay 404/405
    warp::method().and_then(|method: Method| async move {
        if method == Method::OPTIONS {
            Ok(StatusCode::OK)
        } else {
            Err(warp::reject::not_found())
        }
    })
}

/// Adds the CORS headers to every response of `inner`, errors included.
pub fn with_cors<F, R>(
    policy: Arc<CorsPolicy>,
    inner: F,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone
where
    F: Filter<Extract = (R,), Error = Infallible> + Clone + Send + Sync + 'static,
    R: Reply,
{
    warp::header::headers_cloned()
        .and(inner)
        .map(move |headers: HeaderMap, reply: R| {
            policy.decorate(headers.get(ORIGIN), reply.into_response())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_app(policy: CorsPolicy) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
        with_cors(Arc::new(policy), warp::any().map(|| "hello"))
    }

    #[tokio::test]
    async fn echoes_origin_with_credentials() {
        let response = warp::test::request()
            .path("/anything")
            .header("origin", "https://app.example")
            .reply(&echo_app(CorsPolicy::default()))
            .await;

        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "https://app.example");
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-allow-headers"], ALLOW_HEADERS);
        assert_eq!(headers["access-control-allow-methods"], ALLOW_METHODS);
        assert_eq!(headers["vary"], "Origin");
    }

    #[tokio::test]
    async fn allow_list_restricts_echo() {
        let app = echo_app(CorsPolicy::new(vec!["https://trusted.example".into()]));

        let trusted = warp::test::request()
            .header("origin", "https://trusted.example")
            .reply(&app)
            .await;
        assert_eq!(
            trusted.headers()["access-control-allow-origin"],
            "https://trusted.example"
        );

        let stranger = warp::test::request()
            .header("origin", "https://evil.example")
            .reply(&app)
            .await;
        assert!(stranger.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn no_origin_no_echo() {
        let response = warp::test::request()
            .reply(&echo_app(CorsPolicy::default()))
            .await;
        assert!(response.headers().get("access-control-allow-origin").is_none());
        assert_eq!(response.body().as_ref(), b"hello");
    }
}
