//! Per-subject, per-action attempt limiting
//!
//! Protects signup and verification flows from abuse by counting attempts for
//! each `(subject, action)` pair inside a fixed window.
//!
//! ## Window Lifecycle
//!
//! ```text
//! no window            → create (count = 1, reset = now + window)  → Allowed
//! now >= reset         → replace (count = 1, reset = now + window) → Allowed
//! count < max          → increment                                  → Allowed
//! count >= max         → untouched                                  → Denied { retry_after }
//! ```
//!
//! An expired window is replaced, never merged: the previous count is
//! forgotten. This allows a burst of up to `2 * max_attempts` around a window
//! boundary.
//!
//! ## Concurrency
//!
//! The read-check-write for a key is atomic in every store implementation
//! (per-key mutex in memory, a `BEGIN IMMEDIATE` transaction in SQLite), so any
//! number of concurrent callers for one key see at most `max_attempts`
//! allowed outcomes per window.

pub mod error;
pub mod limiter;
pub mod types;

pub use error::RateLimitError;
pub use limiter::RateLimiter;
pub use types::{Action, ActionLimits, AttemptOutcome, Decision, RateLimitWindow};
