//! Shared types for the `crypto-arena` matching core
//!
//! Prices and quantities are fixed-point `i64` values with four decimal
//! places; no floating point exists anywhere on the matching path.
//! Timestamps are nanoseconds since the UNIX epoch, stored as `u64` so
//! that every service orders events identically.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod types;

pub use constants::*;
pub use ids::*;
pub use types::*;
