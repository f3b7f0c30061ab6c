//! Unified error handling
//!
//! All fallible operations in the engine return [`AppResult`]. Errors carry a
//! structured [`ErrorCode`] so callers can distinguish validation failures,
//! expected concurrency conflicts, upstream outages and fatal storage errors
//! without parsing messages.

mod codes;
mod types;

pub use codes::{ErrorCategory, ErrorCode};
pub use types::{AppError, AppResult};
