//! Error codes for the fulfillment and dispatch engine
//!
//! Error codes are organized by range:
//! - 0xxx: General errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Mission errors
//! - 7xxx: Merchant / catalog errors
//! - 8xxx: Upstream dependency errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Represented as u16 values for efficient serialization and stable
/// cross-service identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 2xxx: Permission ====================
    /// Caller is not allowed to perform this operation
    PermissionDenied = 2001,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Requested status transition is not in the allowed-transition table
    OrderInvalidTransition = 4002,
    /// Order has reached a terminal status and admits no further transitions
    OrderTerminal = 4003,
    /// Operation requires a paid order
    OrderNotPaid = 4004,
    /// Order already has an open dispute
    DisputeAlreadyOpen = 4005,
    /// No open dispute to resolve
    DisputeNotOpen = 4006,

    // ==================== 5xxx: Payment ====================
    /// Payment provider rejected the operation
    PaymentRejected = 5001,
    /// Refund rejected (missing transaction or provider error)
    RefundRejected = 5002,

    // ==================== 6xxx: Mission ====================
    /// Mission not found
    MissionNotFound = 6001,
    /// Mission already claimed by another courier (lost the claim race)
    MissionAlreadyClaimed = 6002,
    /// Requested mission status transition is not allowed
    MissionInvalidTransition = 6003,
    /// Mission is not in a claimable or releasable state
    MissionNotAvailable = 6004,
    /// Caller is not the assigned courier
    NotAssignedCourier = 6005,
    /// Delivery one-time code does not match
    OtpMismatch = 6006,
    /// Courier is not verified for deliveries
    CourierNotVerified = 6007,

    // ==================== 7xxx: Merchant / Catalog ====================
    /// Merchant cannot accept orders right now
    MerchantUnavailable = 7001,
    /// Referenced catalog item does not exist
    ItemNotFound = 7002,
    /// Item does not belong to the ordering merchant
    ItemMerchantMismatch = 7003,
    /// Delivery address is outside the merchant's delivery radius
    OutOfDeliveryRange = 7004,

    // ==================== 8xxx: Upstream ====================
    /// Upstream dependency failed
    UpstreamFailed = 8001,
    /// Circuit breaker is open; call rejected without invoking the upstream
    CircuitOpen = 8002,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Storage unavailable or corrupted
    StorageError = 9002,
}

/// Error category per the propagation policy.
///
/// Callers use this to decide whether a failure is a caller mistake, an
/// expected race outcome, a degraded upstream, or unrecoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Rejected synchronously, no state mutated
    Validation,
    /// Expected outcome of a race (e.g. losing a mission claim)
    Conflict,
    /// An external dependency failed or is being shed
    Upstream,
    /// Nothing to recover locally
    Fatal,
}

impl ErrorCode {
    /// Default human-readable message for this code
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderInvalidTransition => "Invalid order status transition",
            ErrorCode::OrderTerminal => "Order is in a terminal status",
            ErrorCode::OrderNotPaid => "Order must be paid first",
            ErrorCode::DisputeAlreadyOpen => "Order already has an open dispute",
            ErrorCode::DisputeNotOpen => "No open dispute to resolve",
            ErrorCode::PaymentRejected => "Payment provider rejected the operation",
            ErrorCode::RefundRejected => "Refund could not be processed",
            ErrorCode::MissionNotFound => "Mission not found",
            ErrorCode::MissionAlreadyClaimed => "Mission already claimed by another courier",
            ErrorCode::MissionInvalidTransition => "Invalid mission status transition",
            ErrorCode::MissionNotAvailable => "Mission is not available in its current state",
            ErrorCode::NotAssignedCourier => "Only the assigned courier may perform this",
            ErrorCode::OtpMismatch => "Invalid delivery code",
            ErrorCode::CourierNotVerified => "Only verified couriers may accept missions",
            ErrorCode::MerchantUnavailable => "Merchant cannot accept orders right now",
            ErrorCode::ItemNotFound => "Item not found",
            ErrorCode::ItemMerchantMismatch => "Item does not belong to this merchant",
            ErrorCode::OutOfDeliveryRange => "Address is outside the delivery range",
            ErrorCode::UpstreamFailed => "Upstream dependency failed",
            ErrorCode::CircuitOpen => "Service unavailable (circuit open)",
            ErrorCode::InternalError => "Internal error",
            ErrorCode::StorageError => "Storage unavailable",
        }
    }

    /// Category for the propagation policy
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::MissionAlreadyClaimed | ErrorCode::AlreadyExists => ErrorCategory::Conflict,
            ErrorCode::UpstreamFailed | ErrorCode::CircuitOpen | ErrorCode::PaymentRejected => {
                ErrorCategory::Upstream
            }
            ErrorCode::InternalError | ErrorCode::StorageError | ErrorCode::Unknown => {
                ErrorCategory::Fatal
            }
            _ => ErrorCategory::Validation,
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code as u16
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            2001 => Ok(ErrorCode::PermissionDenied),
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderInvalidTransition),
            4003 => Ok(ErrorCode::OrderTerminal),
            4004 => Ok(ErrorCode::OrderNotPaid),
            4005 => Ok(ErrorCode::DisputeAlreadyOpen),
            4006 => Ok(ErrorCode::DisputeNotOpen),
            5001 => Ok(ErrorCode::PaymentRejected),
            5002 => Ok(ErrorCode::RefundRejected),
            6001 => Ok(ErrorCode::MissionNotFound),
            6002 => Ok(ErrorCode::MissionAlreadyClaimed),
            6003 => Ok(ErrorCode::MissionInvalidTransition),
            6004 => Ok(ErrorCode::MissionNotAvailable),
            6005 => Ok(ErrorCode::NotAssignedCourier),
            6006 => Ok(ErrorCode::OtpMismatch),
            6007 => Ok(ErrorCode::CourierNotVerified),
            7001 => Ok(ErrorCode::MerchantUnavailable),
            7002 => Ok(ErrorCode::ItemNotFound),
            7003 => Ok(ErrorCode::ItemMerchantMismatch),
            7004 => Ok(ErrorCode::OutOfDeliveryRange),
            8001 => Ok(ErrorCode::UpstreamFailed),
            8002 => Ok(ErrorCode::CircuitOpen),
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StorageError),
            _ => Err(format!("Unknown error code: {}", value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u16)
    }
}
