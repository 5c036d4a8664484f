//! Error types for the matching core

use arena_common::{OrderId, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a submission failed validation
///
/// Rejections are expected outcomes of operating a venue; they never
/// indicate an engine defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// Instrument is not tradable on this engine
    UnknownInstrument,
    /// Instrument exists but is not accepting orders
    InactiveInstrument,
    /// Account is not in the registry
    UnknownAccount,
    /// Account exists but is not permitted to trade
    InactiveAccount,
    /// Quantity was zero or negative
    NonPositiveQuantity,
    /// Quantity above the engine-wide bound
    QuantityTooLarge,
    /// Quantity is not a multiple of the instrument lot size
    LotSizeViolation,
    /// Limit order carried no price
    MissingPrice,
    /// Market order carried a price
    UnexpectedPrice,
    /// Limit price was zero or negative
    NonPositivePrice,
    /// Limit price above the engine-wide bound
    PriceTooLarge,
    /// Limit price is not a multiple of the instrument tick size
    TickSizeViolation,
    /// Request signature did not verify
    InvalidSignature,
    /// An order with this id is already live
    DuplicateOrderId,
    /// Market order found no liquidity on the opposite side
    NoLiquidity,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnknownInstrument => "unknown instrument",
            Self::InactiveInstrument => "inactive instrument",
            Self::UnknownAccount => "unknown account",
            Self::InactiveAccount => "inactive account",
            Self::NonPositiveQuantity => "non-positive quantity",
            Self::QuantityTooLarge => "quantity too large",
            Self::LotSizeViolation => "quantity off lot size",
            Self::MissingPrice => "limit order without price",
            Self::UnexpectedPrice => "market order with price",
            Self::NonPositivePrice => "non-positive price",
            Self::PriceTooLarge => "price too large",
            Self::TickSizeViolation => "price off tick size",
            Self::InvalidSignature => "invalid signature",
            Self::DuplicateOrderId => "duplicate order id",
            Self::NoLiquidity => "no liquidity for market order",
        };
        f.write_str(text)
    }
}

/// Engine-specific error types
///
/// `Rejected` is the validation channel and carries a [`RejectReason`];
/// the other variants are faults. A fault halts the affected instrument
/// rather than letting a corrupt book keep trading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Submission failed validation
    #[error("order {order_id} rejected: {reason}")]
    Rejected {
        /// The order that was rejected
        order_id: OrderId,
        /// Why validation failed
        reason: RejectReason,
    },

    /// A book invariant no longer holds
    #[error("invariant violated on {symbol}: {detail}")]
    InvariantViolation {
        /// Instrument whose book failed its self-check
        symbol: Symbol,
        /// What the self-check found
        detail: String,
    },

    /// The instrument was halted by an earlier invariant violation
    #[error("instrument {symbol} is halted")]
    Halted {
        /// The halted instrument
        symbol: Symbol,
    },
}

impl EngineError {
    /// True when this error is an ordinary validation rejection
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// The rejection reason, when this is a rejection
    #[must_use]
    pub const fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Type alias for engine results
pub type EngineResult<T> = Result<T, EngineError>;
