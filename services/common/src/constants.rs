//! Shared constants for the matching core
//!
//! Single source of truth for fixed-point scales and validation bounds.

/// Fixed-point scale factor (4 decimal places)
pub const FIXED_POINT_SCALE: i64 = 10_000;

/// Nanoseconds per second
pub const NANOS_PER_SEC: u64 = 1_000_000_000;
/// Nanoseconds per millisecond
pub const NANOS_PER_MILLI: u64 = 1_000_000;
/// Nanoseconds per microsecond
pub const NANOS_PER_MICRO: u64 = 1_000;

/// Default instrument tick size in price ticks (0.0001)
pub const DEFAULT_TICK_SIZE: i64 = 1;
/// Default instrument lot size in quantity units (0.0001)
pub const DEFAULT_LOT_SIZE: i64 = 1;

/// Largest accepted price in ticks, prevents overflow in notional math
pub const MAX_PRICE: i64 = i64::MAX / FIXED_POINT_SCALE;
/// Largest accepted order quantity in fixed-point units
pub const MAX_QUANTITY: i64 = 1_000_000_000 * FIXED_POINT_SCALE;
/// Smallest accepted order quantity in fixed-point units
pub const MIN_QUANTITY: i64 = 1;
