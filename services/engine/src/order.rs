//! Order definitions and structures

use arena_common::{AccountId, OrderId, Px, Qty, Symbol, Ts};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Buy order
    Buy = 0,
    /// Sell order
    Sell = 1,
}

impl Side {
    /// Check if this is the buy side
    #[must_use]
    pub const fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }

    /// The side this order trades against
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

/// Price handling for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceType {
    /// Executes up to the limit price, residual rests on the book
    Limit,
    /// Executes against whatever is resting, residual never rests
    Market,
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limit => f.write_str("LIMIT"),
            Self::Market => f.write_str("MARKET"),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted into a book, nothing executed yet
    Accepted,
    /// Some quantity executed, remainder still open
    PartiallyFilled,
    /// Fully executed
    Filled,
    /// Removed from the book with quantity still open
    Cancelled,
    /// Failed validation, never reached a book
    Rejected,
}

/// Why an order left the book with quantity still open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelReason {
    /// Cancel requested by the order owner
    UserRequested,
    /// Market order remainder after the opposite side emptied
    MarketExhausted,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserRequested => f.write_str("user requested"),
            Self::MarketExhausted => f.write_str("market liquidity exhausted"),
        }
    }
}

/// What a submitter sends to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client-assigned order id, unique among live orders
    pub order_id: OrderId,
    /// Submitting account
    pub account: AccountId,
    /// Instrument to trade
    pub symbol: Symbol,
    /// Side
    pub side: Side,
    /// Limit or market handling
    pub price_type: PriceType,
    /// Limit price, present exactly when `price_type` is `Limit`
    pub price: Option<Px>,
    /// Quantity to trade
    pub quantity: Qty,
    /// Hex-encoded HMAC over [`OrderRequest::signing_payload`]
    pub signature: String,
}

impl OrderRequest {
    /// Canonical byte payload covered by the request signature
    ///
    /// Field order is part of the wire contract; submitters sign exactly
    /// this string.
    #[must_use]
    pub fn signing_payload(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.order_id.as_u64(),
            self.account.as_u64(),
            self.symbol.0,
            self.side,
            self.price_type,
            self.price.map_or(0, |px| px.as_i64()),
            self.quantity.as_i64(),
        )
    }
}

/// A working order inside a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Client-assigned identifier
    pub id: OrderId,
    /// Owning account
    pub account: AccountId,
    /// Instrument
    pub symbol: Symbol,
    /// Side
    pub side: Side,
    /// Limit or market handling
    pub price_type: PriceType,
    /// Limit price, `None` for market orders
    pub price: Option<Px>,
    /// Original quantity
    pub quantity: Qty,
    /// Quantity still open
    pub remaining: Qty,
    /// Order status
    pub status: OrderStatus,
    /// Global arrival sequence, assigned once at acceptance
    pub arrival_seq: u64,
    /// Acceptance timestamp
    pub accepted_at: Ts,
}

impl Order {
    /// Build the working order for an accepted request
    #[must_use]
    pub fn from_request(request: &OrderRequest, arrival_seq: u64, accepted_at: Ts) -> Self {
        Self {
            id: request.order_id,
            account: request.account,
            symbol: request.symbol,
            side: request.side,
            price_type: request.price_type,
            price: request.price,
            quantity: request.quantity,
            remaining: request.quantity,
            status: OrderStatus::Accepted,
            arrival_seq,
            accepted_at,
        }
    }

    /// Quantity executed so far
    #[must_use]
    pub const fn executed(&self) -> Qty {
        self.quantity.sub(self.remaining)
    }

    /// Check if the order can still trade
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, OrderStatus::Accepted | OrderStatus::PartiallyFilled)
    }

    /// Check if the order reached a terminal state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}
