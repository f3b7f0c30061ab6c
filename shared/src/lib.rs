//! Shared domain types for the fulfillment and dispatch engine
//!
//! Common types used by the dispatch server and its collaborators:
//! order and mission aggregates, status machines, the monetary breakdown,
//! lifecycle events, and the unified error model.

pub mod error;
pub mod event;
pub mod mission;
pub mod money;
pub mod order;
pub mod types;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use event::LifecycleEvent;
pub use types::{Coordinates, Metadata};
