//! Bootstrap logging at `info` (or `RUST_LOG`), then narrow or widen it once
//! settings are loaded.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
