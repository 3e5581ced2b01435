use std::cell::Cell;
use std::time::{Duration, Instant};
use std::thread;
use rand::Rng;
use log::debug;

/// Spaces out requests: every request after the first of a run starts at
/// least `base` (plus random jitter) after the previous one.
#[derive(Debug)]
pub struct DelayManager {
    base: Duration,
    jitter: Duration,
    last_request: Cell<Option<Instant>>,
}

impl DelayManager {
    pub fn new(base_secs: f64, jitter_secs: f64) -> Self {
        DelayManager {
            base: Duration::from_secs_f64(base_secs.max(0.0)),
            jitter: Duration::from_secs_f64(jitter_secs.max(0.0)),
            last_request: Cell::new(None),
        }
    }

    pub fn none() -> Self {
        DelayManager::new(0.0, 0.0)
    }

    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let mut rng = rand::thread_rng();
        self.base + self.jitter.mul_f64(rng.gen_range(0.0..=1.0))
    }

    /// Blocks until the next request may go out, then records it as sent.
    pub fn before_request(&self) {
        if let Some(last) = self.last_request.get() {
            let wait = self.next_delay().saturating_sub(last.elapsed());
            if !wait.is_zero() {
                debug!("Waiting {:.2}s before next request...", wait.as_secs_f64());
                thread::sleep(wait);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_jitter_delay_is_exact() {
        let delay = DelayManager::new(0.5, 0.0);
        assert_eq!(delay.next_delay(), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let delay = DelayManager::new(0.25, 0.5);
        for _ in 0..100 {
            let d = delay.next_delay();
            assert!(d >= Duration::from_millis(250));
            assert!(d <= Duration::from_millis(750));
        }
    }

    #[test]
    fn negative_values_clamp_to_zero() {
        assert!(DelayManager::new(-1.0, -1.0).next_delay().is_zero());
    }

    #[test]
    fn first_request_goes_out_immediately_and_later_ones_are_spaced() {
        let delay = DelayManager::new(0.05, 0.0);

        let start = Instant::now();
        delay.before_request();
        assert!(start.elapsed() < Duration::from_millis(50));

        delay.before_request();
        assert!(start.elapsed() >= Duration::from_millis(50));
        delay.before_request();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
