//! Rate-limited position polling.
//!
//! Republishes the engine's playback position as observable state while
//! audio is playing. The gate is timestamp-based rather than schedule-based,
//! so irregular host ticks neither drift nor overload the resource backend
//! (some backends recompute the position on every query).

use crate::POSITION_POLL_INTERVAL;

/// Single-flight position poller with a ~4 Hz timestamp gate.
#[derive(Default)]
pub struct PositionPoller {
    active: bool,
    last_publish: Option<f64>,
}

impl PositionPoller {
    /// Create an inactive poller.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether polling is currently scheduled.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start polling. Idempotent: if already scheduled, nothing changes.
    pub fn start(&mut self) {
        if !self.active {
            self.active = true;
            self.last_publish = None;
        }
    }

    /// Stop polling immediately. Idempotent.
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Gate one poll opportunity at host time `now` (seconds).
    ///
    /// Returns true when the caller should read and republish the position
    /// this tick. The first opportunity after [`Self::start`] always
    /// publishes.
    pub fn should_publish(&mut self, now: f64) -> bool {
        if !self.active {
            return false;
        }
        match self.last_publish {
            Some(last) if now - last < POSITION_POLL_INTERVAL => false,
            _ => {
                self.last_publish = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_poller_never_publishes() {
        let mut poller = PositionPoller::new();
        assert!(!poller.should_publish(0.0));
        assert!(!poller.should_publish(10.0));
    }

    #[test]
    fn publishes_at_most_four_times_per_second() {
        let mut poller = PositionPoller::new();
        poller.start();

        // 100 irregular ticks over one second.
        let mut published = 0;
        for i in 0..100 {
            let now = i as f64 * 0.01 + if i % 3 == 0 { 0.002 } else { 0.0 };
            if poller.should_publish(now) {
                published += 1;
            }
        }
        assert!(published <= 4 + 1, "published {published} times");
        assert!(published >= 4);
    }

    #[test]
    fn first_opportunity_after_start_publishes() {
        let mut poller = PositionPoller::new();
        poller.start();
        assert!(poller.should_publish(123.4));
        assert!(!poller.should_publish(123.5));
    }

    #[test]
    fn stop_is_immediate_and_idempotent() {
        let mut poller = PositionPoller::new();
        poller.start();
        assert!(poller.should_publish(0.0));

        poller.stop();
        poller.stop();
        assert!(!poller.should_publish(1.0));

        // Restart does not inherit the stale gate.
        poller.start();
        assert!(poller.should_publish(1.01));
    }

    #[test]
    fn start_while_active_does_not_reset_the_gate() {
        let mut poller = PositionPoller::new();
        poller.start();
        assert!(poller.should_publish(0.0));
        poller.start();
        assert!(!poller.should_publish(0.1));
    }
}
