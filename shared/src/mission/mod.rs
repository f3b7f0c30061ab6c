//! Delivery mission aggregate and its state machine

mod aggregate;
mod types;

pub use aggregate::Mission;
pub use types::{MissionStatus, MissionType};
