//! Request pacing for external collaborators.
//!
//! Every external service gets its own [`Pacer`] enforcing a minimum
//! interval between consecutive calls. Unlike a blanket sleep, the pacer
//! hands out deadlines under a lock, so it stays correct if callers ever
//! run concurrently.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-interval rate limiter for one collaborator.
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Wait until this collaborator may be called again.
    ///
    /// Claims the next free slot atomically, then sleeps outside the lock;
    /// concurrent callers each get their own slot spaced by the interval.
    pub async fn pace(&self) {
        let deadline = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let deadline = match *next {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next = Some(deadline + self.interval);
            deadline
        };

        tokio::time::sleep_until(deadline).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_call_is_immediate() {
        let pacer = Pacer::from_millis(200);
        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_calls_are_spaced() {
        let pacer = Pacer::from_millis(500);

        let start = Instant::now();
        pacer.pace().await;
        pacer.pace().await;
        pacer.pace().await;

        // Two enforced gaps of 500ms each under the paused clock.
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_counts_toward_interval() {
        let pacer = Pacer::from_millis(300);
        pacer.pace().await;

        tokio::time::sleep(Duration::from_millis(400)).await;

        let start = Instant::now();
        pacer.pace().await;
        // Interval already elapsed while idle; no extra wait.
        assert!(start.elapsed() < Duration::from_millis(10));
    }
}
