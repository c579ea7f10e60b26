// store

mod session_registry;

pub use session_registry::*;

// repo

mod credential_repo;

pub use credential_repo::*;

// time

mod clock;

pub use clock::*;
