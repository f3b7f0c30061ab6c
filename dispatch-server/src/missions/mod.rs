//! Mission dispatch and courier position simulation

mod dispatcher;
mod simulator;

pub use dispatcher::{MissionDispatcher, StandaloneMissionInput};
pub use simulator::PositionSimulator;
