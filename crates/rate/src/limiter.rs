//! Process-local token-bucket limiter.
//!
//! Issues one slot per fixed interval (60s / RPM). Acquire order is FIFO by
//! arrival: each caller claims the next free slot under the mutex and then
//! sleeps until that slot's time, so concurrent callers line up in the order
//! they reached the clock.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use domainclaw_core::error::Result;

use crate::deadline_exceeded;

const DEFAULT_RPM: u32 = 55;

/// A single-process pacing gate for provider calls.
pub struct Limiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Limiter {
    /// Create a limiter issuing `rpm` slots per minute (0 falls back to the
    /// default of 55).
    pub fn new(rpm: u32) -> Self {
        let rpm = if rpm == 0 { DEFAULT_RPM } else { rpm };
        Self {
            interval: Duration::from_secs(60) / rpm,
            last: Mutex::new(None),
        }
    }

    /// Block until the next slot, or until `deadline`, whichever comes
    /// first. Deadline expiry returns the caller's timeout error.
    ///
    /// The slot is claimed before sleeping; a caller that times out while
    /// waiting has still consumed its slot, which keeps the pacing budget
    /// honest under cancellation.
    pub async fn acquire(&self, deadline: Option<Instant>) -> Result<()> {
        let slot = {
            let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let next = match *last {
                Some(prev) => {
                    let next = prev + self.interval;
                    if next < now { now } else { next }
                }
                None => now,
            };
            *last = Some(next);
            next
        };

        if let Some(deadline) = deadline {
            if deadline < slot {
                tokio::time::sleep_until(deadline).await;
                return Err(deadline_exceeded());
            }
        }
        tokio::time::sleep_until(slot).await;
        Ok(())
    }

    /// The pacing interval between slots.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rpm_falls_back_to_default() {
        let limiter = Limiter::new(0);
        assert_eq!(limiter.interval(), Duration::from_secs(60) / 55);
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let limiter = Limiter::new(60);
        let start = Instant::now();
        limiter.acquire(None).await.unwrap();
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_acquires_are_spaced_by_interval() {
        let limiter = Limiter::new(60); // one slot per second
        let start = Instant::now();
        limiter.acquire(None).await.unwrap();
        limiter.acquire(None).await.unwrap();
        limiter.acquire(None).await.unwrap();
        let elapsed = Instant::now() - start;
        assert_eq!(elapsed, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_before_slot_surfaces_timeout() {
        let limiter = Limiter::new(60);
        limiter.acquire(None).await.unwrap();
        // Next slot is 1s away; deadline is 100ms away.
        let deadline = Instant::now() + Duration::from_millis(100);
        let err = limiter.acquire(Some(deadline)).await.unwrap_err();
        assert_eq!(err.message, "deadline exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_limiter_does_not_accumulate_burst() {
        let limiter = Limiter::new(60);
        limiter.acquire(None).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        // After a long idle stretch the next two acquires are still spaced.
        let start = Instant::now();
        limiter.acquire(None).await.unwrap();
        limiter.acquire(None).await.unwrap();
        assert_eq!(Instant::now() - start, Duration::from_secs(1));
    }
}
