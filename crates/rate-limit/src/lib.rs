//! Request admission control for Gatekeeper.
//!
//! This crate decides, per request, whether a client may proceed based on how many
//! requests it made within the current fixed window:
//! - [`ClientIdentifier`] derives a stable client key from transport metadata
//! - [`FixedWindowLimiter`] counts requests in a shared [`CounterStore`] and returns a
//!   [`RateLimitDecision`]
//!
//! Counters live either in process memory or in Redis, where they are shared by every
//! server instance using the same database.

#![deny(missing_docs)]

mod decision;
mod error;
mod identity;
mod limiter;
mod manager;
mod storage;

pub use decision::RateLimitDecision;
pub use error::RateLimitError;
pub use identity::ClientIdentifier;
pub use limiter::FixedWindowLimiter;
pub use manager::{RateLimitManager, Storage};
pub use storage::{CounterStore, InMemoryStorage, RedisStorage, StorageError};
