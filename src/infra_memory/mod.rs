mod credential_repo_memory;
mod session_registry_memory;

pub use credential_repo_memory::*;
pub use session_registry_memory::*;
