use super::cors::{self, CorsPolicy};
use super::error::recover_error;
use super::handler;
use super::middleware::with_authentication;
use crate::application_port::AuthService;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;
use warp::reply::Response;

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    // path before method, so an unknown path is a 404 rather than a 405
    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::path("refresh")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::logout);

    let register = warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::register);

    let bootstrap = warp::path("bootstrap")
        .and(warp::path::end())
        .and(warp::get())
        .and(with(auth_service.clone()))
        .and_then(handler::bootstrap);

    let me = warp::path("me")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_authentication(auth_service.clone()))
        .and_then(handler::me);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(handler::health);

    login
        .or(refresh)
        .or(logout)
        .or(register)
        .or(bootstrap)
        .or(me)
        .or(health)
}

/// The whole HTTP surface: preflight, routes, error recovery and CORS.
pub fn app(
    auth_service: Arc<dyn AuthService>,
    cors_policy: Arc<CorsPolicy>,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    let api = cors::preflight()
        .or(routes(auth_service))
        .recover(recover_error);
    cors::with_cors(cors_policy, api)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn json_body<T: DeserializeOwned + Send>()
-> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}
