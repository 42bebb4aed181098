//! Rate limiting and retry for provider calls.
//!
//! The limiter paces this one process against the registrar's requests-per-
//! minute budget; it deliberately does not coordinate a fleet. The retry
//! engine re-attempts classified-retryable failures with exponential backoff
//! and cryptographic jitter, and always honors the caller's deadline.

pub mod limiter;
pub mod retry;

pub use limiter::Limiter;
pub use retry::retry;

use domainclaw_core::error::AppError;

/// The error surfaced when the caller's deadline fires inside a suspension
/// point (limiter wait or retry backoff). Callers see the timeout, not a
/// provider or retry error.
pub fn deadline_exceeded() -> AppError {
    AppError::internal("deadline exceeded")
}
