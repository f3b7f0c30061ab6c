use anyhow::Result;
use dispatch_server::core::{AppState, BackgroundTasks, Config, TaskKind};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    dispatch_server::common::logger::init();

    let config = Config::from_env();
    tracing::info!("starting dispatch engine");

    let state = Arc::new(AppState::build(config));
    let tasks = BackgroundTasks::new();

    {
        let orchestrator = state.orchestrator.clone();
        let token = tasks.cancel_token();
        tasks.spawn(TaskKind::Orchestrator, async move {
            orchestrator.run(token).await;
        });
    }
    {
        let simulator = state.simulator.clone();
        let token = tasks.cancel_token();
        tasks.spawn(TaskKind::PositionSimulator, async move {
            simulator.run(token).await;
        });
    }

    tracing::info!("engine running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    tasks.shutdown().await;
    Ok(())
}
