//! Order aggregate and its state machine

mod aggregate;
mod types;

pub use aggregate::Order;
pub use types::{
    CreateOrderInput, DisputeStatus, OrderItem, OrderItemInput, OrderStatus, PaymentStatus,
    StatusChange,
};
