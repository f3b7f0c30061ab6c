//! Process wiring: configuration, shared state and background tasks

mod config;
mod state;
mod tasks;

pub use config::{Config, SimulatorConfig};
pub use state::AppState;
pub use tasks::{BackgroundTasks, TaskKind};
