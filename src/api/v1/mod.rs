mod cors;
mod error;
mod handler;
mod middleware;
mod router;

pub use cors::{CorsPolicy, preflight, with_cors};
pub use error::{ApiErrorCode, recover_error};
pub use middleware::{AuthContext, bearer_token, with_authentication};
pub use router::{app, routes};
