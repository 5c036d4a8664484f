//! Per-instrument limit order book
//!
//! Strict price-time priority: levels are keyed by price (bid keys are
//! negated so ascending iteration is best-first on both sides) and each
//! level is a FIFO queue. Partial fills decrement the resting order in
//! place, which preserves its queue position.
//!
//! A book performs no synchronization of its own. The engine wraps each
//! book in a mutex and every call here happens inside that critical
//! section.

use arena_common::{OrderId, Px, Qty, Symbol, TradeId, Ts};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, VecDeque};
use tracing::error;

use crate::error::{EngineError, EngineResult, RejectReason};
use crate::events::{DepthLevel, DepthSnapshot, Trade};
use crate::order::{Order, OrderStatus, PriceType, Side};

/// FIFO queue of resting orders at a single price
#[derive(Debug, Default)]
pub struct PriceLevel {
    orders: VecDeque<Order>,
}

impl PriceLevel {
    /// Number of resting orders at this price
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// True when no orders rest at this price
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Total resting quantity at this price
    #[must_use]
    pub fn total_quantity(&self) -> Qty {
        self.orders
            .iter()
            .fold(Qty::ZERO, |acc, order| acc.add(order.remaining))
    }

    fn push_back(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    fn front_mut(&mut self) -> Option<&mut Order> {
        self.orders.front_mut()
    }

    fn pop_front(&mut self) -> Option<Order> {
        self.orders.pop_front()
    }

    fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        let position = self.orders.iter().position(|order| order.id == order_id)?;
        self.orders.remove(position)
    }
}

/// Terminal placement of an incoming order after matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Residual quantity rested on the book
    Rested {
        /// Quantity left open on the book
        remaining: Qty,
    },
    /// The order fully executed
    Filled,
    /// Market remainder cancelled after the opposite side emptied
    CancelledRemainder {
        /// Quantity cancelled
        remaining: Qty,
    },
}

/// What one submission did to the book
#[derive(Debug, Clone)]
pub struct Execution {
    /// Executions printed by this submission, in priority order
    pub trades: Vec<Trade>,
    /// Maker orders fully filled by this submission
    pub filled_makers: Vec<OrderId>,
    /// How the incoming order ended up
    pub disposition: Disposition,
}

/// Limit order book for one instrument
///
/// Created once at engine construction and kept for the process lifetime.
#[derive(Debug)]
pub struct OrderBook {
    symbol: Symbol,
    /// Bid levels keyed by negated price so iteration is best-first
    bids: BTreeMap<i64, PriceLevel>,
    /// Ask levels keyed by price
    asks: BTreeMap<i64, PriceLevel>,
    /// Resting order locations for cancel routing
    order_index: FxHashMap<OrderId, (Side, Px)>,
    /// Per-instrument trade sequence, bumped only inside this book
    trade_seq: u64,
    last_price: Option<Px>,
    halted: bool,
}

impl OrderBook {
    /// Empty book for one instrument
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            order_index: FxHashMap::default(),
            trade_seq: 0,
            last_price: None,
            halted: false,
        }
    }

    /// Instrument this book trades
    #[must_use]
    pub const fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// True when an invariant violation stopped this instrument
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Highest trade sequence assigned so far (0 before the first trade)
    #[must_use]
    pub const fn last_trade_seq(&self) -> u64 {
        self.trade_seq
    }

    /// Last traded price, if any trade has printed
    #[must_use]
    pub const fn last_price(&self) -> Option<Px> {
        self.last_price
    }

    /// Number of resting orders across both sides
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.order_index.len()
    }

    /// Best (highest) bid price
    #[must_use]
    pub fn best_bid(&self) -> Option<Px> {
        self.bids.first_key_value().map(|(key, _)| Px::from_i64(-*key))
    }

    /// Best (lowest) ask price
    #[must_use]
    pub fn best_ask(&self) -> Option<Px> {
        self.asks.first_key_value().map(|(key, _)| Px::from_i64(*key))
    }

    /// Aggregate the top `levels` price levels per side
    #[must_use]
    pub fn depth(&self, levels: usize) -> DepthSnapshot {
        let bids = self
            .bids
            .iter()
            .take(levels)
            .map(|(key, level)| DepthLevel {
                price: Px::from_i64(-*key),
                quantity: level.total_quantity(),
            })
            .collect();
        let asks = self
            .asks
            .iter()
            .take(levels)
            .map(|(key, level)| DepthLevel {
                price: Px::from_i64(*key),
                quantity: level.total_quantity(),
            })
            .collect();
        DepthSnapshot {
            symbol: self.symbol,
            bids,
            asks,
            last_price: self.last_price,
        }
    }

    /// Match an incoming order and rest or dispose of its remainder
    ///
    /// Trades always print at the resting order's price. A limit residual
    /// rests at its limit; a market residual is cancelled, and a market
    /// order that executes nothing is rejected.
    pub fn submit(&mut self, mut order: Order, now: Ts) -> EngineResult<Execution> {
        if self.halted {
            return Err(EngineError::Halted { symbol: self.symbol });
        }

        let limit = match order.price_type {
            PriceType::Limit => order.price,
            PriceType::Market => None,
        };
        let mut trades = Vec::new();
        let mut filled_makers = Vec::new();
        self.match_incoming(&mut order, limit, now, &mut trades, &mut filled_makers);

        let disposition = if order.remaining.is_zero() {
            order.status = OrderStatus::Filled;
            Disposition::Filled
        } else {
            match order.price_type {
                PriceType::Limit => {
                    order.status = if trades.is_empty() {
                        OrderStatus::Accepted
                    } else {
                        OrderStatus::PartiallyFilled
                    };
                    let remaining = order.remaining;
                    self.rest(order)?;
                    Disposition::Rested { remaining }
                }
                PriceType::Market => {
                    if trades.is_empty() {
                        return Err(EngineError::Rejected {
                            order_id: order.id,
                            reason: RejectReason::NoLiquidity,
                        });
                    }
                    order.status = OrderStatus::Cancelled;
                    Disposition::CancelledRemainder {
                        remaining: order.remaining,
                    }
                }
            }
        };

        self.check_integrity()?;
        Ok(Execution {
            trades,
            filled_makers,
            disposition,
        })
    }

    /// Remove a resting order
    ///
    /// `Ok(None)` means the id was not resting (unknown, already filled,
    /// or already cancelled) — a normal outcome, not an error.
    pub fn cancel(&mut self, order_id: OrderId) -> EngineResult<Option<Order>> {
        if self.halted {
            return Err(EngineError::Halted { symbol: self.symbol });
        }
        let Some((side, price)) = self.order_index.remove(&order_id) else {
            return Ok(None);
        };
        let key = Self::level_key(side, price);
        let removed = {
            let side_map = match side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            match side_map.get_mut(&key) {
                Some(level) => {
                    let removed = level.remove(order_id);
                    if level.is_empty() {
                        side_map.remove(&key);
                    }
                    removed
                }
                None => None,
            }
        };
        let Some(mut order) = removed else {
            self.halted = true;
            error!(symbol = %self.symbol, %order_id, "cancel index points at a missing order, halting instrument");
            return Err(EngineError::InvariantViolation {
                symbol: self.symbol,
                detail: format!("cancel index points at missing order {order_id}"),
            });
        };
        order.status = OrderStatus::Cancelled;
        self.check_integrity()?;
        Ok(Some(order))
    }

    fn match_incoming(
        &mut self,
        order: &mut Order,
        limit: Option<Px>,
        now: Ts,
        trades: &mut Vec<Trade>,
        filled_makers: &mut Vec<OrderId>,
    ) {
        loop {
            if order.remaining.is_zero() {
                break;
            }
            let best = match order.side {
                Side::Buy => self.asks.first_key_value().map(|(key, _)| *key),
                Side::Sell => self.bids.first_key_value().map(|(key, _)| *key),
            };
            let Some(key) = best else { break };
            let level_price = match order.side {
                Side::Buy => Px::from_i64(key),
                Side::Sell => Px::from_i64(-key),
            };
            if let Some(limit_price) = limit {
                let crosses = match order.side {
                    Side::Buy => level_price <= limit_price,
                    Side::Sell => level_price >= limit_price,
                };
                if !crosses {
                    break;
                }
            }
            let level = match order.side {
                Side::Buy => self.asks.get_mut(&key),
                Side::Sell => self.bids.get_mut(&key),
            };
            let Some(level) = level else { break };
            let Some(maker) = level.front_mut() else {
                // empty levels are pruned eagerly; integrity check will halt
                break;
            };

            let fill_qty = order.remaining.min(maker.remaining);
            maker.remaining = maker.remaining.sub(fill_qty);
            let maker_filled = maker.remaining.is_zero();
            maker.status = if maker_filled {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            let maker_id = maker.id;
            order.remaining = order.remaining.sub(fill_qty);
            if maker_filled {
                level.pop_front();
            }
            let level_emptied = level.is_empty();
            if level_emptied {
                match order.side {
                    Side::Buy => self.asks.remove(&key),
                    Side::Sell => self.bids.remove(&key),
                };
            }

            self.trade_seq += 1;
            self.last_price = Some(level_price);
            if maker_filled {
                self.order_index.remove(&maker_id);
                filled_makers.push(maker_id);
            }
            trades.push(Trade {
                trade_id: TradeId::new(self.trade_seq),
                symbol: self.symbol,
                price: level_price,
                quantity: fill_qty,
                maker_order_id: maker_id,
                taker_order_id: order.id,
                aggressor: order.side,
                trade_seq: self.trade_seq,
                executed_at: now,
            });
        }
    }

    fn rest(&mut self, order: Order) -> EngineResult<()> {
        let Some(price) = order.price else {
            self.halted = true;
            error!(symbol = %self.symbol, order_id = %order.id, "priceless limit order reached the book, halting instrument");
            return Err(EngineError::InvariantViolation {
                symbol: self.symbol,
                detail: format!("limit order {} without a price reached the book", order.id),
            });
        };
        let side = order.side;
        let id = order.id;
        let key = Self::level_key(side, price);
        self.order_index.insert(id, (side, price));
        match side {
            Side::Buy => self.bids.entry(key).or_default().push_back(order),
            Side::Sell => self.asks.entry(key).or_default().push_back(order),
        }
        Ok(())
    }

    const fn level_key(side: Side, price: Px) -> i64 {
        match side {
            Side::Buy => -price.as_i64(),
            Side::Sell => price.as_i64(),
        }
    }

    fn check_integrity(&mut self) -> EngineResult<()> {
        if let Some(detail) = self.integrity_breach() {
            self.halted = true;
            error!(symbol = %self.symbol, %detail, "order book invariant violated, halting instrument");
            return Err(EngineError::InvariantViolation {
                symbol: self.symbol,
                detail,
            });
        }
        Ok(())
    }

    /// Cheap self-check at the touch points of the last mutation
    fn integrity_breach(&self) -> Option<String> {
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid >= ask {
                return Some(format!("book crossed: bid {bid} >= ask {ask}"));
            }
        }
        for (name, level) in [
            ("bid", self.bids.values().next()),
            ("ask", self.asks.values().next()),
        ] {
            let Some(level) = level else { continue };
            if level.is_empty() {
                return Some(format!("empty {name} level retained"));
            }
            if let Some(front) = level.front() {
                if front.remaining.as_i64() <= 0 {
                    return Some(format!(
                        "non-positive remaining on resting {name} order {}",
                        front.id
                    ));
                }
            }
        }
        None
    }
}
