use std::time::{Duration, Instant};

/// Direction of a throttle flag change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThrottleTransition {
    Started,
    Ended,
}

/// Throttle flag with a dead band between the end and start ratios
#[derive(Debug, Clone)]
pub(crate) struct ThrottleHysteresis {
    start_ratio: f64,
    end_ratio: f64,
    throttling: bool,
}

impl ThrottleHysteresis {
    pub(crate) fn new(start_ratio: f64, end_ratio: f64) -> Self {
        Self {
            start_ratio,
            end_ratio,
            throttling: false,
        }
    }

    pub(crate) fn is_throttling(&self) -> bool {
        self.throttling
    }

    pub(crate) fn update(&mut self, ratio: f64) -> Option<ThrottleTransition> {
        if !self.throttling && ratio > self.start_ratio {
            self.throttling = true;
            Some(ThrottleTransition::Started)
        } else if self.throttling && ratio < self.end_ratio {
            self.throttling = false;
            Some(ThrottleTransition::Ended)
        } else {
            None
        }
    }

    /// Clear the flag, reporting whether it was set
    pub(crate) fn release(&mut self) -> bool {
        std::mem::replace(&mut self.throttling, false)
    }
}

/// Allows one log line per interval
#[derive(Debug, Clone)]
pub(crate) struct LogThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub(crate) fn should_log(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hysteresis() -> ThrottleHysteresis {
        ThrottleHysteresis::new(0.9, 0.7)
    }

    #[test]
    fn starts_above_upper_ratio() {
        let mut h = hysteresis();
        assert_eq!(h.update(0.9), None);
        assert_eq!(h.update(0.91), Some(ThrottleTransition::Started));
        assert_eq!(h.update(0.99), None);
        assert!(h.is_throttling());
    }

    #[test]
    fn ends_below_lower_ratio() {
        let mut h = hysteresis();
        h.update(0.95);
        assert_eq!(h.update(0.7), None);
        assert_eq!(h.update(0.69), Some(ThrottleTransition::Ended));
        assert!(!h.is_throttling());
    }

    #[test]
    fn dead_band_never_flips() {
        let mut idle = hysteresis();
        let mut throttled = hysteresis();
        throttled.update(0.95);

        for ratio in [0.7, 0.75, 0.8, 0.85, 0.9, 0.72, 0.88] {
            assert_eq!(idle.update(ratio), None);
            assert_eq!(throttled.update(ratio), None);
        }
        assert!(!idle.is_throttling());
        assert!(throttled.is_throttling());
    }

    #[test]
    fn release_reports_previous_flag() {
        let mut h = hysteresis();
        assert!(!h.release());
        h.update(0.95);
        assert!(h.release());
        assert!(!h.is_throttling());
    }

    #[test]
    fn log_throttle_spaces_lines() {
        let mut limiter = LogThrottle::new(Duration::from_secs(5));
        let t0 = Instant::now();
        assert!(limiter.should_log(t0));
        assert!(!limiter.should_log(t0 + Duration::from_secs(2)));
        assert!(!limiter.should_log(t0 + Duration::from_millis(4_999)));
        assert!(limiter.should_log(t0 + Duration::from_secs(5)));
        assert!(!limiter.should_log(t0 + Duration::from_secs(6)));
    }
}
