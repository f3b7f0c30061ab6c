//! Circuit breakers for upstream collaborators
//!
//! Every remote collaborator call from the orchestrator and the services
//! goes through a named breaker. Tripping a breaker converts a failing
//! upstream into fast, cheap rejections until a single probe succeeds.

mod circuit;
mod registry;

pub use circuit::{BreakerSettings, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use registry::BreakerRegistry;
