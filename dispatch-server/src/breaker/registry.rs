//! Named breaker registry

use super::circuit::{BreakerSettings, BreakerSnapshot, CircuitBreaker};
use dashmap::DashMap;
use std::sync::Arc;

/// All breakers in the process, keyed by upstream name.
///
/// Registration is idempotent: registering an existing name returns the
/// live breaker with its accumulated state intact.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or fetch) the breaker for an upstream
    pub fn register(&self, name: &str, settings: BreakerSettings) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, settings)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.clone())
    }

    /// Snapshot every breaker for the health report, sorted by name
    pub fn system_status(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerState;
    use shared::AppError;

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = BreakerRegistry::new();
        let first = registry.register("payments", BreakerSettings::default());

        first
            .call(|| async { Err::<(), _>(AppError::upstream("down")) })
            .await
            .ok();

        let second = registry.register("payments", BreakerSettings::default());
        assert_eq!(second.snapshot().failure_count, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_system_status_lists_all_breakers() {
        let registry = BreakerRegistry::new();
        registry.register("payments", BreakerSettings::default());
        registry.register("invoices", BreakerSettings::default());

        let status = registry.system_status();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].name, "invoices");
        assert_eq!(status[1].name, "payments");
        assert!(status.iter().all(|s| s.state == BreakerState::Closed));
    }

    #[tokio::test]
    async fn test_get_unknown_breaker() {
        let registry = BreakerRegistry::new();
        assert!(registry.get("nope").is_none());
        let _ = registry.register("known", BreakerSettings::default());
        assert!(registry.get("known").is_some());
    }
}
