use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, error, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        code.clone()
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
        || err.find::<reject::InvalidHeader>().is_some()
    {
        debug!(?err, "request rejected");
        ApiErrorCode::BadRequest
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::MethodNotAllowed
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else {
        error!(?err, "unhandled rejection");
        ApiErrorCode::InternalError
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum ApiErrorCode {
    // one message for every authentication failure
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Identifier must be 3 to 31 characters and secret 6 to 255")]
    InvalidInput,
    #[error("Identifier already registered")]
    UserExists,
    #[error("Registration is closed")]
    RegistrationClosed,
    #[error("Malformed request")]
    BadRequest,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        error!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiErrorCode::InvalidInput | ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::UserExists => StatusCode::CONFLICT,
            ApiErrorCode::RegistrationClosed => StatusCode::FORBIDDEN,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        if error.is_authentication_failure() {
            warn!(reason = %error, "authentication rejected");
            return ApiErrorCode::Unauthenticated;
        }
        match error {
            AuthError::UserExists => ApiErrorCode::UserExists,
            AuthError::RegistrationClosed => ApiErrorCode::RegistrationClosed,
            AuthError::InvalidInput(reason) => {
                debug!(%reason, "invalid input");
                ApiErrorCode::InvalidInput
            }
            other => ApiErrorCode::internal(other),
        }
    }
}
