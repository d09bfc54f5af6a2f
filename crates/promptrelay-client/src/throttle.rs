//! Minimum-interval dispatch gate

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Depth-1 leaky bucket: at most one dispatch per configured interval.
///
/// A rejected check does not touch the timestamp, so back-to-back rejected
/// attempts keep reporting the cooldown of the last accepted dispatch.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Record a dispatch if allowed, or return the whole seconds remaining
    /// until the next one is.
    pub fn check(&self) -> std::result::Result<(), u64> {
        if self.min_interval.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        let mut last = self.last_dispatch.lock();
        if let Some(previous) = *last {
            let elapsed = now.duration_since(previous);
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                // Round up so the caller never waits too little.
                let secs = remaining.as_secs_f64().ceil().max(1.0) as u64;
                return Err(secs);
            }
        }
        *last = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_dispatch_passes() {
        let throttle = Throttle::new(Duration::from_secs(1));
        assert!(throttle.check().is_ok());
    }

    #[test]
    fn rapid_second_dispatch_is_rejected_with_positive_seconds() {
        let throttle = Throttle::new(Duration::from_secs(1));
        assert!(throttle.check().is_ok());
        let secs = throttle.check().unwrap_err();
        assert!(secs >= 1);
    }

    #[test]
    fn rejection_does_not_reset_the_window() {
        let throttle = Throttle::new(Duration::from_millis(50));
        assert!(throttle.check().is_ok());
        assert!(throttle.check().is_err());
        std::thread::sleep(Duration::from_millis(60));
        // The rejected attempt must not have extended the cooldown.
        assert!(throttle.check().is_ok());
    }

    #[test]
    fn zero_interval_disables_throttling() {
        let throttle = Throttle::new(Duration::ZERO);
        assert!(throttle.check().is_ok());
        assert!(throttle.check().is_ok());
    }
}
