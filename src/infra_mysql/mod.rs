mod credential_repo_mysql;
mod session_registry_mysql;

pub use credential_repo_mysql::*;
pub use session_registry_mysql::*;

mod util;
