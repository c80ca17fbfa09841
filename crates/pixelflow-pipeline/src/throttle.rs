use std::time::{Duration, Instant};

/// Rate limit for histogram recomputation while capturing.
///
/// Holds the time of the last permitted refresh. A frame is permitted when
/// at least `interval` has passed since then, and that frame becomes the new
/// reference.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use pixelflow_pipeline::HistogramThrottle;
///
/// let mut throttle = HistogramThrottle::new(Duration::from_secs(5));
/// let t0 = Instant::now();
///
/// assert!(throttle.permit_at(t0));
/// assert!(!throttle.permit_at(t0 + Duration::from_secs(1)));
/// assert!(throttle.permit_at(t0 + Duration::from_secs(5)));
/// ```
#[derive(Clone, Debug)]
pub struct HistogramThrottle {
    interval: Duration,
    last_refresh: Option<Instant>,
}

impl HistogramThrottle {
    /// Create a throttle that permits once per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_refresh: None,
        }
    }

    /// The minimum time between two permitted refreshes.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Forget the last refresh so that the next frame is permitted.
    pub fn reset(&mut self) {
        self.last_refresh = None;
    }

    /// Decide for a frame arriving at `now`.
    pub fn permit_at(&mut self, now: Instant) -> bool {
        let permitted = match self.last_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if permitted {
            self.last_refresh = Some(now);
        }
        permitted
    }

    /// Decide for a frame arriving now.
    pub fn permit(&mut self) -> bool {
        self.permit_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::HistogramThrottle;
    use std::time::{Duration, Instant};

    #[test]
    fn frames_every_tenth_of_a_second() {
        let mut throttle = HistogramThrottle::new(Duration::from_secs(5));
        let start = Instant::now();

        let permitted: Vec<u64> = (0..=120u64)
            .filter(|i| throttle.permit_at(start + Duration::from_millis(i * 100)))
            .collect();

        assert_eq!(permitted, vec![0, 50, 100]);
    }

    #[test]
    fn reset_permits_next_frame() {
        let mut throttle = HistogramThrottle::new(Duration::from_secs(5));
        let now = Instant::now();
        assert!(throttle.permit_at(now));
        assert!(!throttle.permit_at(now));
        throttle.reset();
        assert!(throttle.permit_at(now));
    }
}
