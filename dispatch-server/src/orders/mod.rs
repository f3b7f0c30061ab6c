//! Order aggregate service

mod service;

pub use service::{OrderService, QuotedTotals};
