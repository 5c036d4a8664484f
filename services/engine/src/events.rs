//! Engine event definitions
//!
//! Everything externally observable about the engine flows through these
//! events. The journal assigns the global `seq` on every variant at append
//! time; within one instrument, event order equals the serial execution
//! order of that instrument's book.

use arena_common::{OrderId, Px, Qty, Symbol, TradeId, Ts};
use serde::{Deserialize, Serialize};

use crate::error::RejectReason;
use crate::order::{CancelReason, Side};

/// A single execution between a resting maker and an incoming taker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Trade identifier, unique per instrument
    pub trade_id: TradeId,
    /// Instrument
    pub symbol: Symbol,
    /// Execution price, always the maker's resting price
    pub price: Px,
    /// Executed quantity
    pub quantity: Qty,
    /// Resting order that provided liquidity
    pub maker_order_id: OrderId,
    /// Incoming order that took liquidity
    pub taker_order_id: OrderId,
    /// Side of the incoming order
    pub aggressor: Side,
    /// Per-instrument trade sequence, strictly increasing and gap-free
    pub trade_seq: u64,
    /// Execution timestamp
    pub executed_at: Ts,
}

/// One aggregated price level of a depth snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Level price
    pub price: Px,
    /// Total resting quantity at this price
    pub quantity: Qty,
}

/// Consistent copy of one book's aggregated state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Instrument
    pub symbol: Symbol,
    /// Bid levels, best (highest) first
    pub bids: Vec<DepthLevel>,
    /// Ask levels, best (lowest) first
    pub asks: Vec<DepthLevel>,
    /// Last traded price, if any trade has printed
    pub last_price: Option<Px>,
}

impl DepthSnapshot {
    /// Best bid price
    #[must_use]
    pub fn best_bid(&self) -> Option<Px> {
        self.bids.first().map(|level| level.price)
    }

    /// Best ask price
    #[must_use]
    pub fn best_ask(&self) -> Option<Px> {
        self.asks.first().map(|level| level.price)
    }
}

/// Events emitted by the engine, in journal order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Submission passed validation and entered its book
    OrderAccepted {
        /// Global event sequence
        seq: u64,
        /// Instrument
        symbol: Symbol,
        /// Accepted order
        order_id: OrderId,
        /// Global arrival sequence of the order
        arrival_seq: u64,
        /// Acceptance timestamp
        ts: Ts,
    },
    /// Submission failed validation and never reached a book
    OrderRejected {
        /// Global event sequence
        seq: u64,
        /// Rejected order
        order_id: OrderId,
        /// Why validation failed
        reason: RejectReason,
        /// Rejection timestamp
        ts: Ts,
    },
    /// Two orders crossed
    TradeExecuted {
        /// Global event sequence
        seq: u64,
        /// The execution
        trade: Trade,
    },
    /// An order left the book with quantity still open
    OrderCancelled {
        /// Global event sequence
        seq: u64,
        /// Instrument
        symbol: Symbol,
        /// Cancelled order
        order_id: OrderId,
        /// Quantity open at cancellation
        remaining: Qty,
        /// Why the order was cancelled
        reason: CancelReason,
        /// Cancellation timestamp
        ts: Ts,
    },
    /// An order's open quantity reached zero
    OrderFilled {
        /// Global event sequence
        seq: u64,
        /// Instrument
        symbol: Symbol,
        /// Filled order
        order_id: OrderId,
        /// Fill timestamp
        ts: Ts,
    },
    /// A book mutation settled; aggregated depth after it
    BookUpdated {
        /// Global event sequence
        seq: u64,
        /// Instrument
        symbol: Symbol,
        /// Bid levels after the mutation, best first
        bids: Vec<DepthLevel>,
        /// Ask levels after the mutation, best first
        asks: Vec<DepthLevel>,
        /// Update timestamp
        ts: Ts,
    },
}

impl EngineEvent {
    /// Global event sequence assigned at journal append
    #[must_use]
    pub const fn seq(&self) -> u64 {
        match self {
            Self::OrderAccepted { seq, .. }
            | Self::OrderRejected { seq, .. }
            | Self::TradeExecuted { seq, .. }
            | Self::OrderCancelled { seq, .. }
            | Self::OrderFilled { seq, .. }
            | Self::BookUpdated { seq, .. } => *seq,
        }
    }

    /// Instrument this event concerns, if any
    #[must_use]
    pub const fn symbol(&self) -> Option<Symbol> {
        match self {
            Self::OrderAccepted { symbol, .. }
            | Self::OrderCancelled { symbol, .. }
            | Self::OrderFilled { symbol, .. }
            | Self::BookUpdated { symbol, .. } => Some(*symbol),
            Self::TradeExecuted { trade, .. } => Some(trade.symbol),
            Self::OrderRejected { .. } => None,
        }
    }

    /// Stamp the journal-assigned sequence
    pub(crate) fn set_seq(&mut self, new_seq: u64) {
        match self {
            Self::OrderAccepted { seq, .. }
            | Self::OrderRejected { seq, .. }
            | Self::TradeExecuted { seq, .. }
            | Self::OrderCancelled { seq, .. }
            | Self::OrderFilled { seq, .. }
            | Self::BookUpdated { seq, .. } => *seq = new_seq,
        }
    }
}
