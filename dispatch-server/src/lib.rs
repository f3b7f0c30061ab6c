//! Order-fulfillment and courier-dispatch engine
//!
//! The core of the delivery marketplace backend: turns a paid order into a
//! delivery mission, matches it exactly-once to an available courier under
//! concurrent demand, enforces the order/mission state machines, computes
//! the monetary breakdown, and fans out the best-effort side effects that
//! follow a payment or delivery event.
//!
//! # Components
//!
//! ```text
//! OrderService ──persist──▶ OrderRepository
//!      │ publish
//!      ▼
//!  EventBus ──▶ SideEffectOrchestrator ──▶ invoices / rewards / notifications
//!      ▲                     │
//!      │ publish             ▼ create / cancel / sync
//! MissionDispatcher ◀────────┘
//!      │
//!      └─ claim / release / verify (per-mission exclusive lock)
//! ```

pub mod breaker;
pub mod collaborators;
pub mod common;
pub mod core;
pub mod events;
pub mod missions;
pub mod orchestrator;
pub mod orders;
pub mod pricing;
pub mod repository;
