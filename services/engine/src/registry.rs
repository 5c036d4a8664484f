//! Instrument and account registry
//!
//! The engine resolves instruments and accounts through this seam during
//! validation and never stores venue metadata itself. Listings carry the
//! tick and lot sizes submissions must conform to.

use arena_common::{AccountId, Px, Qty, Symbol, DEFAULT_LOT_SIZE, DEFAULT_TICK_SIZE};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Venue listing for one instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Compact symbol id
    pub symbol: Symbol,
    /// Human-readable name, e.g. "BTC-USDT"
    pub name: String,
    /// Price increment all limit prices must align to
    pub tick_size: Px,
    /// Quantity increment all orders must align to
    pub lot_size: Qty,
    /// Whether the instrument currently accepts orders
    pub active: bool,
}

impl InstrumentSpec {
    /// Listing with default tick and lot sizes
    #[must_use]
    pub fn new(symbol: Symbol, name: impl Into<String>) -> Self {
        Self {
            symbol,
            name: name.into(),
            tick_size: Px::from_i64(DEFAULT_TICK_SIZE),
            lot_size: Qty::from_i64(DEFAULT_LOT_SIZE),
            active: true,
        }
    }
}

/// Trading account reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    /// Account id
    pub account: AccountId,
    /// Whether the account may trade
    pub active: bool,
}

impl AccountRef {
    /// Active account reference
    #[must_use]
    pub const fn new(account: AccountId) -> Self {
        Self { account, active: true }
    }
}

/// Resolves instruments and accounts for the engine
pub trait Registry: Send + Sync {
    /// Look up an instrument listing
    fn resolve_instrument(&self, symbol: Symbol) -> Option<InstrumentSpec>;

    /// Look up an account
    fn resolve_account(&self, account: AccountId) -> Option<AccountRef>;

    /// All instruments currently listed
    fn instruments(&self) -> Vec<InstrumentSpec>;
}

/// In-memory registry backed by hash maps
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    instruments: RwLock<FxHashMap<Symbol, InstrumentSpec>>,
    accounts: RwLock<FxHashMap<AccountId, AccountRef>>,
}

impl InMemoryRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an instrument listing
    pub fn register_instrument(&self, spec: InstrumentSpec) {
        self.instruments.write().insert(spec.symbol, spec);
    }

    /// Add or replace an account
    pub fn register_account(&self, account: AccountRef) {
        self.accounts.write().insert(account.account, account);
    }
}

impl Registry for InMemoryRegistry {
    fn resolve_instrument(&self, symbol: Symbol) -> Option<InstrumentSpec> {
        self.instruments.read().get(&symbol).cloned()
    }

    fn resolve_account(&self, account: AccountId) -> Option<AccountRef> {
        self.accounts.read().get(&account).copied()
    }

    fn instruments(&self) -> Vec<InstrumentSpec> {
        let mut listings: Vec<InstrumentSpec> =
            self.instruments.read().values().cloned().collect();
        // deterministic order regardless of hash state
        listings.sort_by_key(|spec| spec.symbol);
        listings
    }
}
