//! # Fibonacci Backoff
//!
//! Progressive retry delays for reconciliation errors: each consecutive error
//! for a resource waits the next Fibonacci multiple of the minimum, capped at
//! the maximum.

use std::time::Duration;

/// Fibonacci backoff in seconds
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            previous: 0,
            current: 1,
        }
    }

    /// Next delay in seconds; advances the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let delay = self.current.saturating_mul(self.min_secs).min(self.max_secs);
        if delay < self.max_secs {
            let next = self.previous.saturating_add(self.current);
            self.previous = self.current;
            self.current = next;
        }
        delay
    }

    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = 1;
    }

    /// Delay for the `error_count`-th consecutive error (0-indexed)
    pub fn calculate_for_error_count(error_count: u32, min_secs: u64, max_secs: u64) -> Duration {
        let mut backoff = Self::new(min_secs, max_secs);
        let mut delay = backoff.next_backoff_seconds();
        for _ in 0..error_count {
            delay = backoff.next_backoff_seconds();
        }
        Duration::from_secs(delay)
    }
}

/// Per-resource error tracking used by the error policy
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_follows_fibonacci_multiples() {
        let mut backoff = FibonacciBackoff::new(5, 300);
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(delays, vec![5, 5, 10, 15, 25, 40, 65]);
    }

    #[test]
    fn test_sequence_caps_at_max() {
        let mut backoff = FibonacciBackoff::new(5, 30);
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(delays, vec![5, 5, 10, 15, 25, 30, 30, 30]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = FibonacciBackoff::new(5, 300);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff_seconds(), 5);
    }

    #[test]
    fn test_calculate_for_error_count() {
        assert_eq!(
            FibonacciBackoff::calculate_for_error_count(0, 5, 300),
            Duration::from_secs(5)
        );
        assert_eq!(
            FibonacciBackoff::calculate_for_error_count(3, 5, 300),
            Duration::from_secs(15)
        );
    }
}
