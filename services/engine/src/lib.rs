//! Crypto-arena matching core
//!
//! Per-instrument limit order books with strict price-time priority:
//! - Fixed-point prices and quantities end to end, no floating point
//! - One serialization domain per instrument, instruments in parallel
//! - Global arrival sequencing, per-instrument trade sequencing
//! - Append-only execution journal with restartable consumption
//! - Registry and signature verification at the validation boundary
//!
//! Submissions are validated, sequenced, matched, and journaled in one
//! linearizable step per instrument; replaying the same submissions in
//! the same order reproduces the same trades.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arena_common::{OrderId, Px, Symbol, Ts, MAX_PRICE, MAX_QUANTITY, MIN_QUANTITY};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

pub mod auth;
pub mod book;
pub mod error;
pub mod events;
pub mod journal;
pub mod order;
pub mod registry;

use auth::SignatureVerifier;
use book::{Disposition, Execution, OrderBook};
use error::{EngineError, EngineResult, RejectReason};
use events::{DepthSnapshot, EngineEvent, Trade};
use journal::ExecutionJournal;
use order::{CancelReason, Order, OrderRequest, OrderStatus, PriceType};
use registry::Registry;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Price levels carried on book updates and depth snapshots
    pub depth_levels: usize,
    /// Initial journal capacity in events
    pub journal_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            depth_levels: 10,
            journal_capacity: 65_536,
        }
    }
}

/// What a successful submission returned
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    /// The submitted order's id
    pub order_id: OrderId,
    /// Global arrival sequence assigned to this submission
    pub arrival_seq: u64,
    /// Final status of the incoming order
    pub status: OrderStatus,
    /// Executions printed by this submission, in priority order
    pub trades: Vec<Trade>,
    /// Journaled events for this submission, in sequence order
    pub events: Vec<EngineEvent>,
}

/// Engine counters
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Submissions accepted into a book
    pub orders_accepted: AtomicU64,
    /// Submissions rejected at validation
    pub orders_rejected: AtomicU64,
    /// Trades executed
    pub trades_executed: AtomicU64,
    /// Cancels that removed a resting order
    pub cancels_honored: AtomicU64,
    /// Cancels that found nothing to remove
    pub cancels_missed: AtomicU64,
    /// Instruments halted by invariant violations
    pub instruments_halted: AtomicU64,
    /// Traded volume in fixed-point units
    pub total_volume: AtomicU64,
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy)]
pub struct EngineMetricsSnapshot {
    /// Submissions accepted into a book
    pub orders_accepted: u64,
    /// Submissions rejected at validation
    pub orders_rejected: u64,
    /// Trades executed
    pub trades_executed: u64,
    /// Cancels that removed a resting order
    pub cancels_honored: u64,
    /// Cancels that found nothing to remove
    pub cancels_missed: u64,
    /// Instruments halted by invariant violations
    pub instruments_halted: u64,
    /// Traded volume in fixed-point units
    pub total_volume: u64,
    /// Orders currently live on a book
    pub live_orders: usize,
}

/// The matching core: validates, sequences, matches, and journals
///
/// Each instrument's book sits behind its own mutex; the book map itself
/// never changes after construction, so routing takes no global lock and
/// submissions for different instruments run in parallel.
pub struct MatchingEngine {
    config: EngineConfig,
    /// One lock per instrument, built from the registry listing
    books: FxHashMap<Symbol, Mutex<OrderBook>>,
    /// Live order locations for cancel routing and duplicate detection.
    /// Never taken while holding a book lock.
    live_orders: RwLock<FxHashMap<OrderId, Symbol>>,
    /// Global arrival sequence
    arrival_seq: AtomicU64,
    registry: Arc<dyn Registry>,
    verifier: Arc<dyn SignatureVerifier>,
    journal: Arc<ExecutionJournal>,
    metrics: EngineMetrics,
}

impl MatchingEngine {
    /// Build an engine with one book per active registry instrument
    ///
    /// The book set is fixed here; listings registered later are not
    /// tradable on this engine instance.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        registry: Arc<dyn Registry>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        let mut books = FxHashMap::default();
        for spec in registry.instruments() {
            if spec.active {
                debug!(symbol = %spec.symbol, name = %spec.name, "listing instrument");
                books.insert(spec.symbol, Mutex::new(OrderBook::new(spec.symbol)));
            }
        }
        info!(instruments = books.len(), "matching engine ready");
        Self {
            journal: Arc::new(ExecutionJournal::new(config.journal_capacity)),
            config,
            books,
            live_orders: RwLock::new(FxHashMap::default()),
            arrival_seq: AtomicU64::new(1),
            registry,
            verifier,
            metrics: EngineMetrics::default(),
        }
    }

    /// Validate, sequence, match, and journal one submission
    ///
    /// All events of the submission are appended to the journal while the
    /// instrument's lock is still held, so per-instrument journal order
    /// equals the book's serial execution order.
    pub fn submit(&self, request: OrderRequest) -> EngineResult<SubmitReceipt> {
        let now = Ts::now();
        if let Err(reason) = self.validate(&request) {
            return self.reject(&request, reason, now);
        }
        {
            // reserve the id so a concurrent duplicate cannot slip in
            let mut live = self.live_orders.write();
            if live.contains_key(&request.order_id) {
                drop(live);
                return self.reject(&request, RejectReason::DuplicateOrderId, now);
            }
            live.insert(request.order_id, request.symbol);
        }
        let Some(book) = self.books.get(&request.symbol) else {
            // validate() filters unknown symbols; this guards divergence
            // between the registry and the book set built at startup
            self.release(request.order_id);
            return self.reject(&request, RejectReason::UnknownInstrument, now);
        };
        let arrival_seq = self.arrival_seq.fetch_add(1, Ordering::SeqCst);
        let order = Order::from_request(&request, arrival_seq, now);

        let outcome = {
            let mut book = book.lock();
            match book.submit(order, now) {
                Ok(execution) => {
                    let batch = self.build_events(&request, arrival_seq, &execution, &book, now);
                    let events = self.journal.append_batch(batch);
                    Ok((execution, events))
                }
                Err(err) => {
                    if let EngineError::Rejected { order_id, reason } = &err {
                        self.journal.append_batch(vec![EngineEvent::OrderRejected {
                            seq: 0,
                            order_id: *order_id,
                            reason: *reason,
                            ts: now,
                        }]);
                    }
                    Err(err)
                }
            }
        };

        match outcome {
            Ok((execution, events)) => {
                {
                    let mut live = self.live_orders.write();
                    for maker in &execution.filled_makers {
                        live.remove(maker);
                    }
                    if !matches!(execution.disposition, Disposition::Rested { .. }) {
                        live.remove(&request.order_id);
                    }
                }
                let volume: i64 = execution
                    .trades
                    .iter()
                    .map(|trade| trade.quantity.as_i64())
                    .sum();
                self.metrics.orders_accepted.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .trades_executed
                    .fetch_add(execution.trades.len() as u64, Ordering::Relaxed);
                self.metrics
                    .total_volume
                    .fetch_add(volume as u64, Ordering::Relaxed);
                let status = match execution.disposition {
                    Disposition::Filled => OrderStatus::Filled,
                    Disposition::CancelledRemainder { .. } => OrderStatus::Cancelled,
                    Disposition::Rested { .. } => {
                        if execution.trades.is_empty() {
                            OrderStatus::Accepted
                        } else {
                            OrderStatus::PartiallyFilled
                        }
                    }
                };
                debug!(
                    order_id = %request.order_id,
                    symbol = %request.symbol,
                    trades = execution.trades.len(),
                    ?status,
                    "submission processed"
                );
                Ok(SubmitReceipt {
                    order_id: request.order_id,
                    arrival_seq,
                    status,
                    trades: execution.trades,
                    events,
                })
            }
            Err(err) => {
                self.release(request.order_id);
                match err {
                    EngineError::Rejected { order_id, reason } => {
                        self.metrics.orders_rejected.fetch_add(1, Ordering::Relaxed);
                        debug!(%order_id, %reason, "submission rejected");
                        Err(EngineError::Rejected { order_id, reason })
                    }
                    other => {
                        if matches!(other, EngineError::InvariantViolation { .. }) {
                            self.metrics.instruments_halted.fetch_add(1, Ordering::Relaxed);
                        }
                        warn!(order_id = %request.order_id, error = %other, "submission failed on a faulted instrument");
                        Err(other)
                    }
                }
            }
        }
    }

    /// Cancel a live order wherever it rests
    ///
    /// `Ok(false)` means there was nothing to cancel — unknown id, already
    /// filled, or already cancelled. A cancel racing a fill resolves under
    /// the book lock to exactly one of the two outcomes.
    pub fn cancel(&self, order_id: OrderId) -> EngineResult<bool> {
        let now = Ts::now();
        let symbol = self.live_orders.read().get(&order_id).copied();
        let Some(symbol) = symbol else {
            self.metrics.cancels_missed.fetch_add(1, Ordering::Relaxed);
            debug!(%order_id, "cancel missed, order not live");
            return Ok(false);
        };
        let Some(book) = self.books.get(&symbol) else {
            return Err(EngineError::InvariantViolation {
                symbol,
                detail: format!("live order {order_id} indexed to an unknown book"),
            });
        };
        let cancelled = {
            let mut book = book.lock();
            match book.cancel(order_id) {
                Ok(Some(order)) => {
                    let depth = book.depth(self.config.depth_levels);
                    self.journal.append_batch(vec![
                        EngineEvent::OrderCancelled {
                            seq: 0,
                            symbol,
                            order_id,
                            remaining: order.remaining,
                            reason: CancelReason::UserRequested,
                            ts: now,
                        },
                        EngineEvent::BookUpdated {
                            seq: 0,
                            symbol,
                            bids: depth.bids,
                            asks: depth.asks,
                            ts: now,
                        },
                    ]);
                    true
                }
                Ok(None) => false,
                Err(err) => {
                    if matches!(err, EngineError::InvariantViolation { .. }) {
                        self.metrics.instruments_halted.fetch_add(1, Ordering::Relaxed);
                    }
                    return Err(err);
                }
            }
        };
        if cancelled {
            self.release(order_id);
            self.metrics.cancels_honored.fetch_add(1, Ordering::Relaxed);
            debug!(%order_id, %symbol, "order cancelled");
            Ok(true)
        } else {
            // the order went terminal between the index read and the lock
            self.metrics.cancels_missed.fetch_add(1, Ordering::Relaxed);
            debug!(%order_id, "cancel missed, order already terminal");
            Ok(false)
        }
    }

    /// Consistent depth snapshot for one instrument
    #[must_use]
    pub fn depth(&self, symbol: Symbol) -> Option<DepthSnapshot> {
        self.books
            .get(&symbol)
            .map(|book| book.lock().depth(self.config.depth_levels))
    }

    /// Best (highest) bid for an instrument
    #[must_use]
    pub fn best_bid(&self, symbol: Symbol) -> Option<Px> {
        self.books.get(&symbol).and_then(|book| book.lock().best_bid())
    }

    /// Best (lowest) ask for an instrument
    #[must_use]
    pub fn best_ask(&self, symbol: Symbol) -> Option<Px> {
        self.books.get(&symbol).and_then(|book| book.lock().best_ask())
    }

    /// True when the instrument was halted by an invariant violation
    #[must_use]
    pub fn is_halted(&self, symbol: Symbol) -> bool {
        self.books
            .get(&symbol)
            .is_some_and(|book| book.lock().is_halted())
    }

    /// Instruments tradable on this engine, in symbol order
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.books.keys().copied().collect();
        symbols.sort_unstable();
        symbols
    }

    /// Handle to the execution journal
    #[must_use]
    pub fn journal(&self) -> Arc<ExecutionJournal> {
        Arc::clone(&self.journal)
    }

    /// Live tail of the execution journal
    pub fn subscribe(&self) -> crossbeam::channel::Receiver<EngineEvent> {
        self.journal.subscribe()
    }

    /// Point-in-time copy of the engine counters
    #[must_use]
    pub fn metrics(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            orders_accepted: self.metrics.orders_accepted.load(Ordering::Relaxed),
            orders_rejected: self.metrics.orders_rejected.load(Ordering::Relaxed),
            trades_executed: self.metrics.trades_executed.load(Ordering::Relaxed),
            cancels_honored: self.metrics.cancels_honored.load(Ordering::Relaxed),
            cancels_missed: self.metrics.cancels_missed.load(Ordering::Relaxed),
            instruments_halted: self.metrics.instruments_halted.load(Ordering::Relaxed),
            total_volume: self.metrics.total_volume.load(Ordering::Relaxed),
            live_orders: self.live_orders.read().len(),
        }
    }

    fn validate(&self, request: &OrderRequest) -> Result<(), RejectReason> {
        if !self.books.contains_key(&request.symbol) {
            return Err(RejectReason::UnknownInstrument);
        }
        let Some(spec) = self.registry.resolve_instrument(request.symbol) else {
            return Err(RejectReason::UnknownInstrument);
        };
        if !spec.active {
            return Err(RejectReason::InactiveInstrument);
        }
        let Some(account) = self.registry.resolve_account(request.account) else {
            return Err(RejectReason::UnknownAccount);
        };
        if !account.active {
            return Err(RejectReason::InactiveAccount);
        }
        let qty = request.quantity.as_i64();
        if qty < MIN_QUANTITY {
            return Err(RejectReason::NonPositiveQuantity);
        }
        if qty > MAX_QUANTITY {
            return Err(RejectReason::QuantityTooLarge);
        }
        let lot = spec.lot_size.as_i64();
        if lot > 0 && qty % lot != 0 {
            return Err(RejectReason::LotSizeViolation);
        }
        match request.price_type {
            PriceType::Limit => {
                let Some(price) = request.price else {
                    return Err(RejectReason::MissingPrice);
                };
                let ticks = price.as_i64();
                if ticks <= 0 {
                    return Err(RejectReason::NonPositivePrice);
                }
                if ticks > MAX_PRICE {
                    return Err(RejectReason::PriceTooLarge);
                }
                let tick = spec.tick_size.as_i64();
                if tick > 0 && ticks % tick != 0 {
                    return Err(RejectReason::TickSizeViolation);
                }
            }
            PriceType::Market => {
                if request.price.is_some() {
                    return Err(RejectReason::UnexpectedPrice);
                }
            }
        }
        if !self.verifier.verify(request) {
            return Err(RejectReason::InvalidSignature);
        }
        Ok(())
    }

    fn reject(
        &self,
        request: &OrderRequest,
        reason: RejectReason,
        now: Ts,
    ) -> EngineResult<SubmitReceipt> {
        self.metrics.orders_rejected.fetch_add(1, Ordering::Relaxed);
        debug!(order_id = %request.order_id, %reason, "submission rejected");
        self.journal.append_batch(vec![EngineEvent::OrderRejected {
            seq: 0,
            order_id: request.order_id,
            reason,
            ts: now,
        }]);
        Err(EngineError::Rejected {
            order_id: request.order_id,
            reason,
        })
    }

    fn release(&self, order_id: OrderId) {
        self.live_orders.write().remove(&order_id);
    }

    fn build_events(
        &self,
        request: &OrderRequest,
        arrival_seq: u64,
        execution: &Execution,
        book: &OrderBook,
        now: Ts,
    ) -> Vec<EngineEvent> {
        let symbol = request.symbol;
        let mut events =
            Vec::with_capacity(3 + execution.trades.len() + execution.filled_makers.len());
        events.push(EngineEvent::OrderAccepted {
            seq: 0,
            symbol,
            order_id: request.order_id,
            arrival_seq,
            ts: now,
        });
        for trade in &execution.trades {
            events.push(EngineEvent::TradeExecuted {
                seq: 0,
                trade: trade.clone(),
            });
        }
        for maker in &execution.filled_makers {
            events.push(EngineEvent::OrderFilled {
                seq: 0,
                symbol,
                order_id: *maker,
                ts: now,
            });
        }
        match execution.disposition {
            Disposition::Filled => {
                events.push(EngineEvent::OrderFilled {
                    seq: 0,
                    symbol,
                    order_id: request.order_id,
                    ts: now,
                });
            }
            Disposition::CancelledRemainder { remaining } => {
                events.push(EngineEvent::OrderCancelled {
                    seq: 0,
                    symbol,
                    order_id: request.order_id,
                    remaining,
                    reason: CancelReason::MarketExhausted,
                    ts: now,
                });
            }
            Disposition::Rested { .. } => {}
        }
        let depth = book.depth(self.config.depth_levels);
        events.push(EngineEvent::BookUpdated {
            seq: 0,
            symbol,
            bids: depth.bids,
            asks: depth.asks,
            ts: now,
        });
        events
    }
}

impl fmt::Debug for MatchingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchingEngine")
            .field("instruments", &self.books.len())
            .field("arrival_seq", &self.arrival_seq)
            .finish_non_exhaustive()
    }
}
