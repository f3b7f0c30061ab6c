//! Courier position simulation
//!
//! Background task that walks every in-flight mission toward its
//! destination each tick, keeping an odometer for final-earnings
//! calculation and firing the approach/arrival notices. Writes go through
//! metadata patches only, so the simulator can never clobber a concurrent
//! claim or status change.

use crate::collaborators::{Notification, Notifier, RealtimeGateway};
use crate::core::SimulatorConfig;
use crate::pricing::distance_km;
use crate::repository::MissionRepository;
use serde_json::json;
use shared::mission::{Mission, MissionStatus};
use shared::types::Coordinates;
use shared::AppResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const APPROACH_FLAG: &str = "approach_notified";
const ARRIVAL_FLAG: &str = "arrival_notified";

pub struct PositionSimulator {
    missions: Arc<dyn MissionRepository>,
    realtime: Arc<dyn RealtimeGateway>,
    notifier: Arc<dyn Notifier>,
    config: SimulatorConfig,
}

impl PositionSimulator {
    pub fn new(
        missions: Arc<dyn MissionRepository>,
        realtime: Arc<dyn RealtimeGateway>,
        notifier: Arc<dyn Notifier>,
        config: SimulatorConfig,
    ) -> Self {
        Self {
            missions,
            realtime,
            notifier,
            config,
        }
    }

    /// Tick loop; runs until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            "position simulator started (tick {:?})",
            self.config.tick_interval
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("position simulator stopping");
                    break;
                }
                _ = tokio::time::sleep(self.config.tick_interval) => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!("simulator tick failed: {err}");
                    }
                }
            }
        }
    }

    /// Advance every in-flight mission one step.
    ///
    /// A failure on one mission never blocks the others.
    pub async fn tick(&self) -> AppResult<()> {
        for mission in self.missions.find_by_status(MissionStatus::OnWay).await? {
            if let Err(err) = self.advance(&mission).await {
                tracing::warn!("simulator skipped mission {}: {err}", mission.id);
            }
        }
        Ok(())
    }

    async fn advance(&self, mission: &Mission) -> AppResult<()> {
        let current = mission.simulated_position();
        let remaining = distance_km(current, mission.destination);
        if remaining <= 0.0 {
            return Ok(());
        }

        // move a fraction of the remaining leg, snapping when close enough
        let next = if remaining <= self.config.arrival_km {
            mission.destination
        } else {
            let f = self.config.speed_factor;
            Coordinates::new(
                current.lat + (mission.destination.lat - current.lat) * f,
                current.lng + (mission.destination.lng - current.lng) * f,
            )
        };
        let step = distance_km(current, next);
        let traveled = mission
            .metadata
            .get("traveled_km")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            + step;

        let mut entries = vec![
            ("current_lat".to_string(), json!(next.lat)),
            ("current_lng".to_string(), json!(next.lng)),
            ("traveled_km".to_string(), json!(traveled)),
        ];

        let remaining_after = distance_km(next, mission.destination);
        let flagged = |key: &str| {
            mission
                .metadata
                .get(key)
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        };

        if remaining_after <= self.config.arrival_km && !flagged(ARRIVAL_FLAG) {
            entries.push((ARRIVAL_FLAG.to_string(), json!(true)));
            self.notify(mission, "Your courier has arrived", "Meet your courier at the door")
                .await;
        } else if remaining_after <= self.config.approach_notice_km && !flagged(APPROACH_FLAG) {
            entries.push((APPROACH_FLAG.to_string(), json!(true)));
            self.notify(mission, "Your courier is nearby", "Your order is almost there")
                .await;
        }

        self.missions.merge_metadata(&mission.id, entries).await?;
        self.realtime.courier_position(&mission.id, next);
        Ok(())
    }

    async fn notify(&self, mission: &Mission, title: &str, body: &str) {
        let Some(customer_id) = &mission.customer_id else {
            return;
        };
        let result = self
            .notifier
            .notify(Notification {
                recipient_id: customer_id.clone(),
                title: title.to_string(),
                body: body.to_string(),
            })
            .await;
        if let Err(err) = result {
            tracing::warn!("notice for mission {} failed: {err}", mission.id);
        }
    }
}
