//! Sliding-window request counter

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Timestamps of recent requests, oldest first
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    timestamps: VecDeque<Instant>,
    window: Duration,
}

impl SlidingWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            timestamps: VecDeque::new(),
            window,
        }
    }

    /// Record a request timestamp.
    ///
    /// Requests finish out of order, so a late event is slotted in behind the
    /// newer ones to keep the queue sorted.
    pub fn record(&mut self, at: Instant) {
        match self.timestamps.back() {
            Some(&last) if at < last => {
                let idx = self.timestamps.partition_point(|&t| t <= at);
                self.timestamps.insert(idx, at);
            }
            _ => self.timestamps.push_back(at),
        }
    }

    /// Drop every timestamp older than the window relative to `now` and
    /// return how many remain
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        self.timestamps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_prefix() {
        let start = Instant::now();
        let mut window = SlidingWindow::new(Duration::from_secs(60));

        for secs in [0, 10, 20, 30] {
            window.record(start + Duration::from_secs(secs));
        }

        assert_eq!(window.evict_expired(start + Duration::from_secs(60)), 4);
        assert_eq!(window.evict_expired(start + Duration::from_secs(75)), 2);
        assert_eq!(window.evict_expired(start + Duration::from_secs(200)), 0);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let start = Instant::now();
        let mut window = SlidingWindow::new(Duration::from_secs(60));
        window.record(start);

        assert_eq!(window.evict_expired(start + Duration::from_secs(60)), 1);
        assert_eq!(
            window.evict_expired(start + Duration::from_millis(60_001)),
            0
        );
    }

    #[test]
    fn test_out_of_order_record_stays_sorted() {
        let start = Instant::now();
        let mut window = SlidingWindow::new(Duration::from_secs(60));

        window.record(start + Duration::from_secs(50));
        window.record(start);
        window.record(start + Duration::from_secs(70));
        window.record(start + Duration::from_secs(20));

        // Only the entry at 0s is older than 60s at t=65s
        assert_eq!(window.evict_expired(start + Duration::from_secs(65)), 3);
        assert_eq!(window.evict_expired(start + Duration::from_secs(81)), 2);
    }
}
